//! Country directory used to populate address forms.
//!
//! ISO 3166-1 alpha-2 codes with their common English names, sorted by code.

use serde::Serialize;

/// A selectable country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    /// ISO 3166-1 alpha-2 code (e.g., "NL").
    pub code: &'static str,
    /// Common English name.
    pub name: &'static str,
}

impl Country {
    const fn new(code: &'static str, name: &'static str) -> Self {
        Self { code, name }
    }
}

/// All known countries, sorted by code.
pub const COUNTRIES: &[Country] = &[
    Country::new("AD", "Andorra"),
    Country::new("AE", "United Arab Emirates"),
    Country::new("AF", "Afghanistan"),
    Country::new("AG", "Antigua & Barbuda"),
    Country::new("AI", "Anguilla"),
    Country::new("AL", "Albania"),
    Country::new("AM", "Armenia"),
    Country::new("AO", "Angola"),
    Country::new("AQ", "Antarctica"),
    Country::new("AR", "Argentina"),
    Country::new("AS", "Samoa (American)"),
    Country::new("AT", "Austria"),
    Country::new("AU", "Australia"),
    Country::new("AW", "Aruba"),
    Country::new("AX", "Åland Islands"),
    Country::new("AZ", "Azerbaijan"),
    Country::new("BA", "Bosnia & Herzegovina"),
    Country::new("BB", "Barbados"),
    Country::new("BD", "Bangladesh"),
    Country::new("BE", "Belgium"),
    Country::new("BF", "Burkina Faso"),
    Country::new("BG", "Bulgaria"),
    Country::new("BH", "Bahrain"),
    Country::new("BI", "Burundi"),
    Country::new("BJ", "Benin"),
    Country::new("BL", "St Barthelemy"),
    Country::new("BM", "Bermuda"),
    Country::new("BN", "Brunei"),
    Country::new("BO", "Bolivia"),
    Country::new("BQ", "Caribbean NL"),
    Country::new("BR", "Brazil"),
    Country::new("BS", "Bahamas"),
    Country::new("BT", "Bhutan"),
    Country::new("BV", "Bouvet Island"),
    Country::new("BW", "Botswana"),
    Country::new("BY", "Belarus"),
    Country::new("BZ", "Belize"),
    Country::new("CA", "Canada"),
    Country::new("CC", "Cocos (Keeling) Islands"),
    Country::new("CD", "Congo (Dem. Rep.)"),
    Country::new("CF", "Central African Rep."),
    Country::new("CG", "Congo (Rep.)"),
    Country::new("CH", "Switzerland"),
    Country::new("CI", "Côte d'Ivoire"),
    Country::new("CK", "Cook Islands"),
    Country::new("CL", "Chile"),
    Country::new("CM", "Cameroon"),
    Country::new("CN", "China"),
    Country::new("CO", "Colombia"),
    Country::new("CR", "Costa Rica"),
    Country::new("CU", "Cuba"),
    Country::new("CV", "Cape Verde"),
    Country::new("CW", "Curaçao"),
    Country::new("CX", "Christmas Island"),
    Country::new("CY", "Cyprus"),
    Country::new("CZ", "Czech Republic"),
    Country::new("DE", "Germany"),
    Country::new("DJ", "Djibouti"),
    Country::new("DK", "Denmark"),
    Country::new("DM", "Dominica"),
    Country::new("DO", "Dominican Republic"),
    Country::new("DZ", "Algeria"),
    Country::new("EC", "Ecuador"),
    Country::new("EE", "Estonia"),
    Country::new("EG", "Egypt"),
    Country::new("EH", "Western Sahara"),
    Country::new("ER", "Eritrea"),
    Country::new("ES", "Spain"),
    Country::new("ET", "Ethiopia"),
    Country::new("FI", "Finland"),
    Country::new("FJ", "Fiji"),
    Country::new("FK", "Falkland Islands"),
    Country::new("FM", "Micronesia"),
    Country::new("FO", "Faroe Islands"),
    Country::new("FR", "France"),
    Country::new("GA", "Gabon"),
    Country::new("GB", "United Kingdom"),
    Country::new("GD", "Grenada"),
    Country::new("GE", "Georgia"),
    Country::new("GF", "French Guiana"),
    Country::new("GG", "Guernsey"),
    Country::new("GH", "Ghana"),
    Country::new("GI", "Gibraltar"),
    Country::new("GL", "Greenland"),
    Country::new("GM", "Gambia"),
    Country::new("GN", "Guinea"),
    Country::new("GP", "Guadeloupe"),
    Country::new("GQ", "Equatorial Guinea"),
    Country::new("GR", "Greece"),
    Country::new("GS", "South Georgia & the South Sandwich Islands"),
    Country::new("GT", "Guatemala"),
    Country::new("GU", "Guam"),
    Country::new("GW", "Guinea-Bissau"),
    Country::new("GY", "Guyana"),
    Country::new("HK", "Hong Kong"),
    Country::new("HM", "Heard Island & McDonald Islands"),
    Country::new("HN", "Honduras"),
    Country::new("HR", "Croatia"),
    Country::new("HT", "Haiti"),
    Country::new("HU", "Hungary"),
    Country::new("ID", "Indonesia"),
    Country::new("IE", "Ireland"),
    Country::new("IL", "Israel"),
    Country::new("IM", "Isle of Man"),
    Country::new("IN", "India"),
    Country::new("IO", "British Indian Ocean Territory"),
    Country::new("IQ", "Iraq"),
    Country::new("IR", "Iran"),
    Country::new("IS", "Iceland"),
    Country::new("IT", "Italy"),
    Country::new("JE", "Jersey"),
    Country::new("JM", "Jamaica"),
    Country::new("JO", "Jordan"),
    Country::new("JP", "Japan"),
    Country::new("KE", "Kenya"),
    Country::new("KG", "Kyrgyzstan"),
    Country::new("KH", "Cambodia"),
    Country::new("KI", "Kiribati"),
    Country::new("KM", "Comoros"),
    Country::new("KN", "St Kitts & Nevis"),
    Country::new("KP", "Korea (North)"),
    Country::new("KR", "Korea (South)"),
    Country::new("KW", "Kuwait"),
    Country::new("KY", "Cayman Islands"),
    Country::new("KZ", "Kazakhstan"),
    Country::new("LA", "Laos"),
    Country::new("LB", "Lebanon"),
    Country::new("LC", "St Lucia"),
    Country::new("LI", "Liechtenstein"),
    Country::new("LK", "Sri Lanka"),
    Country::new("LR", "Liberia"),
    Country::new("LS", "Lesotho"),
    Country::new("LT", "Lithuania"),
    Country::new("LU", "Luxembourg"),
    Country::new("LV", "Latvia"),
    Country::new("LY", "Libya"),
    Country::new("MA", "Morocco"),
    Country::new("MC", "Monaco"),
    Country::new("MD", "Moldova"),
    Country::new("ME", "Montenegro"),
    Country::new("MF", "St Martin (French)"),
    Country::new("MG", "Madagascar"),
    Country::new("MH", "Marshall Islands"),
    Country::new("MK", "North Macedonia"),
    Country::new("ML", "Mali"),
    Country::new("MM", "Myanmar (Burma)"),
    Country::new("MN", "Mongolia"),
    Country::new("MO", "Macau"),
    Country::new("MP", "Northern Mariana Islands"),
    Country::new("MQ", "Martinique"),
    Country::new("MR", "Mauritania"),
    Country::new("MS", "Montserrat"),
    Country::new("MT", "Malta"),
    Country::new("MU", "Mauritius"),
    Country::new("MV", "Maldives"),
    Country::new("MW", "Malawi"),
    Country::new("MX", "Mexico"),
    Country::new("MY", "Malaysia"),
    Country::new("MZ", "Mozambique"),
    Country::new("NA", "Namibia"),
    Country::new("NC", "New Caledonia"),
    Country::new("NE", "Niger"),
    Country::new("NF", "Norfolk Island"),
    Country::new("NG", "Nigeria"),
    Country::new("NI", "Nicaragua"),
    Country::new("NL", "Netherlands"),
    Country::new("NO", "Norway"),
    Country::new("NP", "Nepal"),
    Country::new("NR", "Nauru"),
    Country::new("NU", "Niue"),
    Country::new("NZ", "New Zealand"),
    Country::new("OM", "Oman"),
    Country::new("PA", "Panama"),
    Country::new("PE", "Peru"),
    Country::new("PF", "French Polynesia"),
    Country::new("PG", "Papua New Guinea"),
    Country::new("PH", "Philippines"),
    Country::new("PK", "Pakistan"),
    Country::new("PL", "Poland"),
    Country::new("PM", "St Pierre & Miquelon"),
    Country::new("PN", "Pitcairn"),
    Country::new("PR", "Puerto Rico"),
    Country::new("PS", "Palestine"),
    Country::new("PT", "Portugal"),
    Country::new("PW", "Palau"),
    Country::new("PY", "Paraguay"),
    Country::new("QA", "Qatar"),
    Country::new("RE", "Réunion"),
    Country::new("RO", "Romania"),
    Country::new("RS", "Serbia"),
    Country::new("RU", "Russia"),
    Country::new("RW", "Rwanda"),
    Country::new("SA", "Saudi Arabia"),
    Country::new("SB", "Solomon Islands"),
    Country::new("SC", "Seychelles"),
    Country::new("SD", "Sudan"),
    Country::new("SE", "Sweden"),
    Country::new("SG", "Singapore"),
    Country::new("SH", "St Helena"),
    Country::new("SI", "Slovenia"),
    Country::new("SJ", "Svalbard & Jan Mayen"),
    Country::new("SK", "Slovakia"),
    Country::new("SL", "Sierra Leone"),
    Country::new("SM", "San Marino"),
    Country::new("SN", "Senegal"),
    Country::new("SO", "Somalia"),
    Country::new("SR", "Suriname"),
    Country::new("SS", "South Sudan"),
    Country::new("ST", "Sao Tome & Principe"),
    Country::new("SV", "El Salvador"),
    Country::new("SX", "St Maarten (Dutch)"),
    Country::new("SY", "Syria"),
    Country::new("SZ", "Eswatini (Swaziland)"),
    Country::new("TC", "Turks & Caicos Is"),
    Country::new("TD", "Chad"),
    Country::new("TF", "French S. Terr."),
    Country::new("TG", "Togo"),
    Country::new("TH", "Thailand"),
    Country::new("TJ", "Tajikistan"),
    Country::new("TK", "Tokelau"),
    Country::new("TL", "East Timor"),
    Country::new("TM", "Turkmenistan"),
    Country::new("TN", "Tunisia"),
    Country::new("TO", "Tonga"),
    Country::new("TR", "Turkey"),
    Country::new("TT", "Trinidad & Tobago"),
    Country::new("TV", "Tuvalu"),
    Country::new("TW", "Taiwan"),
    Country::new("TZ", "Tanzania"),
    Country::new("UA", "Ukraine"),
    Country::new("UG", "Uganda"),
    Country::new("UM", "US minor outlying islands"),
    Country::new("US", "United States"),
    Country::new("UY", "Uruguay"),
    Country::new("UZ", "Uzbekistan"),
    Country::new("VA", "Vatican City"),
    Country::new("VC", "St Vincent"),
    Country::new("VE", "Venezuela"),
    Country::new("VG", "Virgin Islands (UK)"),
    Country::new("VI", "Virgin Islands (US)"),
    Country::new("VN", "Vietnam"),
    Country::new("VU", "Vanuatu"),
    Country::new("WF", "Wallis & Futuna"),
    Country::new("WS", "Samoa (western)"),
    Country::new("YE", "Yemen"),
    Country::new("YT", "Mayotte"),
    Country::new("ZA", "South Africa"),
    Country::new("ZM", "Zambia"),
    Country::new("ZW", "Zimbabwe"),
];

/// Look up a country name by its ISO code (case-insensitive).
#[must_use]
pub fn country_name(code: &str) -> Option<&'static str> {
    let code = code.trim().to_ascii_uppercase();
    COUNTRIES
        .binary_search_by(|country| country.code.cmp(code.as_str()))
        .ok()
        .and_then(|index| COUNTRIES.get(index))
        .map(|country| country.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countries_sorted_and_unique() {
        assert!(COUNTRIES.windows(2).all(|pair| pair[0].code < pair[1].code));
    }

    #[test]
    fn test_country_name_lookup() {
        assert_eq!(country_name("nl"), Some("Netherlands"));
        assert_eq!(country_name("ES"), Some("Spain"));
        assert_eq!(country_name("XX"), None);
    }
}
