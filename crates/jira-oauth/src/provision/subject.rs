//! Certificate subject fields and the validators used by the wizard.

use std::sync::LazyLock;

use regex::Regex;

use super::error::ProvisioningError;

/// ISO 3166-1 alpha-2 country codes.
pub const COUNTRIES: &[&str] = &[
    "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT", "AU", "AW", "AX",
    "AZ", "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN", "BO", "BQ",
    "BR", "BS", "BT", "BV", "BW", "BY", "BZ", "CA", "CC", "CD", "CF", "CG", "CH", "CI", "CK",
    "CL", "CM", "CN", "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ", "DE", "DJ", "DK", "DM",
    "DO", "DZ", "EC", "EE", "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK", "FM", "FO", "FR",
    "GA", "GB", "GD", "GE", "GF", "GG", "GH", "GI", "GL", "GM", "GN", "GP", "GQ", "GR", "GS",
    "GT", "GU", "GW", "GY", "HK", "HM", "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN",
    "IO", "IQ", "IR", "IS", "IT", "JE", "JM", "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN",
    "KP", "KR", "KW", "KY", "KZ", "LA", "LB", "LC", "LI", "LK", "LR", "LS", "LT", "LU", "LV",
    "LY", "MA", "MC", "MD", "ME", "MF", "MG", "MH", "MK", "ML", "MM", "MN", "MO", "MP", "MQ",
    "MR", "MS", "MT", "MU", "MV", "MW", "MX", "MY", "MZ", "NA", "NC", "NE", "NF", "NG", "NI",
    "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG", "PH", "PK", "PL", "PM",
    "PN", "PR", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW", "SA", "SB", "SC",
    "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR", "SS", "ST", "SV",
    "SX", "SY", "SZ", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO", "TR",
    "TT", "TV", "TW", "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE", "VG", "VI",
    "VN", "VU", "WF", "WS", "YE", "YT", "ZA", "ZM", "ZW",
];

/// Longest certificate validity accepted, in days (about 100 years).
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// addr-spec subset: dot-atom local part, hostname labels with at least one dot.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$",
    )
    .unwrap()
});

/// Distinguished name of the self-signed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSubject {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub organizational_unit: String,
    pub common_name: String,
    pub email: String,
}

impl CertificateSubject {
    /// Run every field through its validator.
    pub fn validate(&self) -> Result<(), ProvisioningError> {
        validate_country(&self.country)?;
        for value in [
            &self.state,
            &self.locality,
            &self.organization,
            &self.organizational_unit,
            &self.common_name,
        ] {
            validate_not_empty(value)?;
        }
        validate_email(&self.email)?;
        Ok(())
    }
}

/// Accept an uppercase ISO 3166-1 alpha-2 code.
pub fn validate_country(value: &str) -> Result<String, ProvisioningError> {
    if COUNTRIES.contains(&value) {
        Ok(value.to_owned())
    } else {
        Err(ProvisioningError::InvalidCountry(value.to_owned()))
    }
}

pub fn validate_not_empty(value: &str) -> Result<String, ProvisioningError> {
    if value.is_empty() {
        return Err(ProvisioningError::Empty);
    }
    Ok(value.to_owned())
}

pub fn validate_email(value: &str) -> Result<String, ProvisioningError> {
    if value.len() <= 254 && EMAIL_RE.is_match(value) {
        Ok(value.to_owned())
    } else {
        Err(ProvisioningError::InvalidEmail(value.to_owned()))
    }
}

/// Parse a whole number of days between 1 and [`MAX_VALIDITY_DAYS`].
pub fn validate_validity_days(value: &str) -> Result<u32, ProvisioningError> {
    let invalid = || ProvisioningError::InvalidValidity(value.to_owned());
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let days = value.parse::<u32>().map_err(|_| invalid())?;
    check_validity_days(days)
}

pub(crate) fn check_validity_days(days: u32) -> Result<u32, ProvisioningError> {
    if (1..=MAX_VALIDITY_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(ProvisioningError::InvalidValidity(days.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn subject() -> CertificateSubject {
        CertificateSubject {
            country: "RO".to_owned(),
            state: "Cluj".to_owned(),
            locality: "Cluj-Napoca".to_owned(),
            organization: "Example, Inc.".to_owned(),
            organizational_unit: "Engineering".to_owned(),
            common_name: "jira-oauth.example.com".to_owned(),
            email: "admin@example.com".to_owned(),
        }
    }

    #[test]
    fn test_country_list() {
        assert_eq!(COUNTRIES.len(), 249);
        assert!(validate_country("US").is_ok());
        assert!(validate_country("GB").is_ok());
        assert!(matches!(
            validate_country("us"),
            Err(ProvisioningError::InvalidCountry(_))
        ));
        assert!(validate_country("UK").is_err());
        assert!(validate_country("").is_err());
    }

    #[test]
    fn test_not_empty() {
        assert_eq!(validate_not_empty("x").unwrap(), "x");
        assert!(matches!(validate_not_empty(""), Err(ProvisioningError::Empty)));
    }

    #[test]
    fn test_email() {
        for valid in ["admin@example.com", "first.last+tag@mail.example.co.uk", "a@b.io"] {
            assert!(validate_email(valid).is_ok(), "{valid} rejected");
        }
        for invalid in [
            "",
            "admin",
            "admin@",
            "@example.com",
            "admin@example",
            "a..b@example.com",
            ".a@example.com",
            "admin@-example.com",
            "admin@exa mple.com",
        ] {
            assert!(validate_email(invalid).is_err(), "{invalid} accepted");
        }
    }

    #[test]
    fn test_validity_days() {
        assert_eq!(validate_validity_days("365").unwrap(), 365);
        assert_eq!(validate_validity_days("36500").unwrap(), MAX_VALIDITY_DAYS);
        for invalid in ["0", "-1", "1.5", "abc", "", " 30", "36501", "3000000", "99999999999"] {
            assert!(
                matches!(
                    validate_validity_days(invalid),
                    Err(ProvisioningError::InvalidValidity(_))
                ),
                "{invalid} accepted"
            );
        }
    }

    #[test]
    fn test_subject_validate() {
        subject().validate().unwrap();

        let mut bad = subject();
        bad.organizational_unit.clear();
        assert!(matches!(bad.validate(), Err(ProvisioningError::Empty)));

        let mut bad = subject();
        bad.email = "nope".to_owned();
        assert!(matches!(bad.validate(), Err(ProvisioningError::InvalidEmail(_))));
    }
}
