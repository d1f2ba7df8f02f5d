use super::ConfigError;
use std::fmt;

const NORMALIZED_SCHEME: &str = "postgresql";

/// PostgreSQL connection string normalized to the `postgresql://` scheme.
///
/// Both the generic form (`postgres://`, `postgresql://`) and the
/// driver-qualified form used by the web backend (`postgresql+psycopg2://`)
/// are accepted.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseUrl(String);

impl DatabaseUrl {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| ConfigError::InvalidDatabaseUrl(mask_password(trimmed)))?;

        let base = scheme
            .split_once('+')
            .map_or(scheme, |(base, _driver)| base)
            .to_ascii_lowercase();

        if base != "postgres" && base != "postgresql" {
            return Err(ConfigError::UnsupportedDatabaseScheme(scheme.to_string()));
        }
        if rest.is_empty() {
            return Err(ConfigError::InvalidDatabaseUrl(mask_password(trimmed)));
        }

        Ok(Self(format!("{NORMALIZED_SCHEME}://{rest}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask_password(&self.0))
    }
}

impl fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatabaseUrl({self})")
    }
}

fn mask_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _password)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_and_driver_qualified_schemes_normalize() {
        let expected = "postgresql://app:secret@db:5432/estatecore";
        for raw in [
            "postgres://app:secret@db:5432/estatecore",
            "postgresql://app:secret@db:5432/estatecore",
            "postgresql+psycopg2://app:secret@db:5432/estatecore",
            " POSTGRES+psycopg://app:secret@db:5432/estatecore ",
        ] {
            let url = DatabaseUrl::parse(raw).expect("accepted scheme");
            assert_eq!(url.as_str(), expected, "{raw}");
        }
    }

    #[test]
    fn rejects_other_stores() {
        match DatabaseUrl::parse("sqlite:///estatecore.db") {
            Err(ConfigError::UnsupportedDatabaseScheme(scheme)) => assert_eq!(scheme, "sqlite"),
            other => panic!("expected unsupported scheme, got {other:?}"),
        }
        assert!(matches!(
            DatabaseUrl::parse("localhost:5432"),
            Err(ConfigError::InvalidDatabaseUrl(_))
        ));
    }

    #[test]
    fn display_masks_password() {
        let url = DatabaseUrl::parse("postgres://app:hunter2@db/estatecore").expect("valid url");
        assert_eq!(url.to_string(), "postgresql://app:***@db/estatecore");
        assert!(!format!("{url:?}").contains("hunter2"));
    }
}
