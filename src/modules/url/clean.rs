//! URL normalization.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Drop query and fragment, strip one trailing `/` from the path
    Canonical,
    /// Lower-case host with a `www.` prefix, `https`, lower-case path
    Redirection,
    /// `canonical` then `redirection`
    All,
}

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("invalid url: {0}")]
    Parse(#[from] url::ParseError),

    #[error("url has no host")]
    MissingHost,

    #[error("cannot rewrite '{0}' url to https")]
    Scheme(String),
}

pub fn clean(raw: &str, operation: Operation) -> Result<String, CleanError> {
    let mut url = Url::parse(raw.trim())?;
    match operation {
        Operation::Canonical => canonicalize(&mut url),
        Operation::Redirection => redirect(&mut url)?,
        Operation::All => {
            canonicalize(&mut url);
            redirect(&mut url)?;
        }
    }
    Ok(url.to_string())
}

fn canonicalize(url: &mut Url) {
    url.set_query(None);
    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 {
        if let Some(stripped) = path.strip_suffix('/') {
            let stripped = stripped.to_string();
            url.set_path(&stripped);
        }
    }
}

fn redirect(url: &mut Url) -> Result<(), CleanError> {
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or(CleanError::MissingHost)?
        .to_lowercase();

    if !host.starts_with("www.") {
        url.set_host(Some(&format!("www.{host}")))?;
    }

    if url.scheme() != "https" {
        let scheme = url.scheme().to_string();
        url.set_scheme("https").map_err(|()| CleanError::Scheme(scheme))?;
    }

    let path = url.path().to_lowercase();
    url.set_path(&path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_drops_query_fragment_and_trailing_slash() {
        let cleaned = clean(
            "https://Example.com/Books/1984/?utm_source=x#reviews",
            Operation::Canonical,
        )
        .unwrap();
        assert_eq!(cleaned, "https://example.com/Books/1984");
    }

    #[test]
    fn canonical_keeps_root_path() {
        assert_eq!(
            clean("http://example.com/?q=1", Operation::Canonical).unwrap(),
            "http://example.com/"
        );
    }

    #[test]
    fn redirection_forces_www_https_and_lowercase_path() {
        let cleaned = clean("http://Example.com:8080/Books?Q=Orwell", Operation::Redirection).unwrap();
        assert_eq!(cleaned, "https://www.example.com:8080/books?Q=Orwell");
    }

    #[test]
    fn redirection_keeps_existing_www() {
        assert_eq!(
            clean("https://www.example.com/a", Operation::Redirection).unwrap(),
            "https://www.example.com/a"
        );
    }

    #[test]
    fn all_applies_both_steps() {
        let cleaned = clean("http://Example.com/Library/?page=2#top", Operation::All).unwrap();
        assert_eq!(cleaned, "https://www.example.com/library");
    }

    #[test]
    fn unparseable_and_hostless_urls_are_errors() {
        assert!(matches!(
            clean("not a url", Operation::Canonical),
            Err(CleanError::Parse(_))
        ));
        assert!(matches!(
            clean("mailto:someone@example.com", Operation::Redirection),
            Err(CleanError::MissingHost)
        ));
    }
}
