use std::env::VarError;
use std::fmt::{Debug, Display};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MailBackend {
    /// Log messages instead of sending them.
    Console,
    Smtp,
}

impl FromStr for MailBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "smtp" => Ok(Self::Smtp),
            other => Err(format!("unknown mail backend {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub sqlite_db: String,
    pub db_workers: usize,

    /// Base of the links put in e-mails.
    pub site_url: String,

    pub mail_from: String,
    pub mail_backend: MailBackend,
    pub mail_workers: usize,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,

    pub digest_interval_days: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Ok(Config {
            sqlite_db: Self::var_or("SQLITE_DB", "gazette.sqlite")?,
            db_workers: Self::non_zero("DB_WORKERS", 2usize)?,

            site_url: Self::var_or("SITE_URL", "http://127.0.0.1:8000")?,

            mail_from: Self::var_or("MAIL_FROM", "noreply@gazette.local")?,
            mail_backend: Self::var_or("MAIL_BACKEND", MailBackend::Console)?,
            mail_workers: Self::non_zero("MAIL_WORKERS", 2usize)?,

            smtp_host: Self::var_or("SMTP_HOST", "localhost")?,
            smtp_port: Self::var_or("SMTP_PORT", 25u16)?,
            smtp_username: Self::var_opt("SMTP_USERNAME")?,
            smtp_password: Self::var_opt("SMTP_PASSWORD")?,

            digest_interval_days: Self::non_zero("DIGEST_INTERVAL_DAYS", 7u32)?,
        })
    }

    pub fn digest_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.digest_interval_days) * 24 * 60 * 60)
    }

    fn var<K, V>(key: K) -> Result<V, Error>
    where
        K: Display,
        V: FromStr,
        V::Err: Display,
    {
        let key = format!("GAZETTE_{}", key);
        match std::env::var(&key) {
            Ok(val) => val
                .parse()
                .map_err(|err| Error::ValueConversion(key, format!("{}", err))),
            Err(VarError::NotPresent) => Err(Error::Missing(key)),
            Err(VarError::NotUnicode(_)) => Err(Error::ValueNotUnicode(key)),
        }
    }

    fn var_or<K, V, D>(key: K, default: D) -> Result<V, Error>
    where
        K: Display,
        V: Debug + FromStr,
        V::Err: Display,
        D: Into<V>,
    {
        match Self::var(key) {
            Err(Error::Missing(key)) => {
                let val: V = default.into();
                log::debug!("{} is not defined, using default: {:?}", key, val);
                Ok(val)
            }
            res => res,
        }
    }

    fn non_zero<K, V>(key: K, default: V) -> Result<V, Error>
    where
        K: Display,
        V: Debug + Default + FromStr + PartialEq,
        V::Err: Display,
    {
        let val = Self::var_or(&key, default)?;
        if val == V::default() {
            return Err(Error::ValueConversion(
                format!("GAZETTE_{}", key),
                "must not be zero".to_owned(),
            ));
        }

        Ok(val)
    }

    fn var_opt<K, V>(key: K) -> Result<Option<V>, Error>
    where
        K: Display,
        V: FromStr,
        V::Err: Display,
    {
        match Self::var(key) {
            Ok(val) => Ok(Some(val)),
            Err(Error::Missing(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing value for {0}")]
    Missing(String),
    #[error("Could not parse {0}'s value as a UTF-8 string")]
    ValueNotUnicode(String),
    #[error("Could not parse {0}'s value: {1}")]
    ValueConversion(String, String),
}


#[cfg(test)]
mod tests {
    use super::*;

    // Every test uses its own variables since tests share the environment

    #[test]
    fn defaults_when_missing() {
        let port: u16 = Config::var_or("TEST_MISSING_PORT", 25u16).unwrap();
        let user: Option<String> = Config::var_opt("TEST_MISSING_USER").unwrap();

        assert_eq!(port, 25);
        assert_eq!(user, None);
    }

    #[test]
    fn parses_values() {
        std::env::set_var("GAZETTE_TEST_BACKEND", " SMTP ");
        std::env::set_var("GAZETTE_TEST_USER", "mailer");

        let backend: MailBackend = Config::var("TEST_BACKEND").unwrap();
        let user: Option<String> = Config::var_opt("TEST_USER").unwrap();

        assert_eq!(backend, MailBackend::Smtp);
        assert_eq!(user.as_deref(), Some("mailer"));
    }

    #[test]
    fn errors_name_the_variable() {
        std::env::set_var("GAZETTE_TEST_BAD_PORT", "not a port");

        let err = Config::var_or::<_, u16, _>("TEST_BAD_PORT", 25u16).unwrap_err();
        assert!(err.to_string().contains("GAZETTE_TEST_BAD_PORT"));

        let err = Config::var::<_, u16>("TEST_NO_PORT").unwrap_err();
        assert_eq!(err.to_string(), "Missing value for GAZETTE_TEST_NO_PORT");
    }

    #[test]
    fn zero_digest_interval_is_rejected() {
        // Only this test reads the real digest interval variable
        std::env::set_var("GAZETTE_DIGEST_INTERVAL_DAYS", "0");

        let err = Config::from_env().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not parse GAZETTE_DIGEST_INTERVAL_DAYS's value: must not be zero"
        );

        std::env::set_var("GAZETTE_TEST_ZERO_WORKERS", "0");
        assert!(Config::non_zero("TEST_ZERO_WORKERS", 2usize).is_err());
        assert_eq!(Config::non_zero("TEST_MISSING_WORKERS", 2usize).unwrap(), 2);
    }

    #[test]
    fn digest_interval_in_days() {
        let mut cfg = Config {
            sqlite_db: ":memory:".to_owned(),
            db_workers: 1,
            site_url: "http://localhost".to_owned(),
            mail_from: "noreply@localhost".to_owned(),
            mail_backend: MailBackend::Console,
            mail_workers: 1,
            smtp_host: "localhost".to_owned(),
            smtp_port: 25,
            smtp_username: None,
            smtp_password: None,
            digest_interval_days: 7,
        };

        assert_eq!(cfg.digest_interval().as_secs(), 7 * 24 * 3600);

        cfg.digest_interval_days = 1;
        assert_eq!(cfg.digest_interval().as_secs(), 24 * 3600);
    }
}
