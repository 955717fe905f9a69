//! Incremental request URLs.
//!
//! A [`RequestUrl`] is built from a first URI reference and then refined by
//! merging further references into it: `"https://api.example.com/v2"`, then
//! `"users"`, then `"?page=2"`, and so on. Each component of a reference
//! overrides the matching component of the URL only when it is present, so a
//! fragment like `"//other-host"` swaps the host and keeps everything else.
//!
//! # Merge rules
//!
//! - scheme, user info, host: replaced when the reference has one.
//! - query: replaced by the reference's query when that is non-empty or the
//!   reference ends in a bare `?` (which clears it).
//! - an unescaped `&` in the reference's path appends everything after it to
//!   the query instead; the path ends before the `&`. `"&page=2"` adds a
//!   parameter where `"?page=2"` would replace them all. Escape it as `%26` to
//!   keep a literal ampersand in a path.
//! - path: an absolute path replaces, a relative one is appended after `/`.
//! - fragment: always taken from the reference, including clearing it.
//!
//! Components are kept in their escaped form; the URL renders back exactly as
//! it was written.
//!
//! # Example
//!
//! ```rust
//! use httpreq::RequestUrl;
//!
//! let mut url = RequestUrl::parse("//localhost/basepath?init=first").unwrap();
//! url.merge("subpath/2?init=second#only+here").unwrap();
//! assert_eq!(url.to_string(), "//localhost/basepath/subpath/2?init=second#only+here");
//!
//! url.merge("/newbase/3").unwrap();
//! assert_eq!(url.to_string(), "//localhost/newbase/3?init=second");
//! ```

use std::fmt;

use crate::clients::errors::ReferenceError;

/// The user information part of an authority, still escaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    username: String,
    password: Option<String>,
}

impl UserInfo {
    /// Returns the user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password, if one was given.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)?;
        if let Some(password) = &self.password {
            write!(f, ":{password}")?;
        }
        Ok(())
    }
}

/// A possibly partial URL assembled from URI references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestUrl {
    scheme: Option<String>,
    user: Option<UserInfo>,
    host: String,
    path: String,
    query: String,
    force_query: bool,
    fragment: String,
}

/// Merges `reference` into `base`, or parses it on its own when there is no base.
///
/// The base is never modified; the merged URL is returned as a new value.
///
/// # Errors
///
/// Returns [`ReferenceError`] if `reference` is not a valid URI reference.
pub fn merge(base: Option<&RequestUrl>, reference: &str) -> Result<RequestUrl, ReferenceError> {
    let parsed = RequestUrl::parse(reference)?;
    Ok(match base {
        Some(base) => {
            let mut merged = base.clone();
            merged.apply(parsed);
            merged
        }
        None => parsed,
    })
}

impl RequestUrl {
    /// Parses a URI reference into its components.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] on control characters, bad `%` escapes,
    /// a leading `:`, a colon in the first segment of a relative path, a
    /// non-numeric port, or invalid host characters.
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        if reference.chars().any(|c| c.is_ascii_control()) {
            return Err(ReferenceError::ControlCharacter);
        }

        let mut url = Self::default();

        let (rest, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        check_escapes(fragment)?;
        url.fragment = fragment.to_string();

        let (scheme, mut rest) = split_scheme(rest)?;
        url.scheme = scheme.map(str::to_ascii_lowercase);

        if let Some(stripped) = rest.strip_suffix('?').filter(|r| !r.contains('?')) {
            url.force_query = true;
            rest = stripped;
        } else if let Some((before, query)) = rest.split_once('?') {
            check_escapes(query)?;
            url.query = query.to_string();
            rest = before;
        }

        if rest.starts_with("//") && (url.scheme.is_some() || !rest.starts_with("///")) {
            let after = &rest[2..];
            let (authority, path) = after.find('/').map_or((after, ""), |i| after.split_at(i));
            url.parse_authority(authority)?;
            rest = path;
        } else if url.scheme.is_none() {
            let first_segment = rest.split('/').next().unwrap_or_default();
            if first_segment.contains(':') {
                return Err(ReferenceError::ColonInFirstSegment);
            }
        }

        check_escapes(rest)?;
        url.path = rest.to_string();

        Ok(url)
    }

    fn parse_authority(&mut self, authority: &str) -> Result<(), ReferenceError> {
        let host = match authority.rsplit_once('@') {
            Some((userinfo, host)) => {
                check_escapes(userinfo)?;
                let (username, password) = match userinfo.split_once(':') {
                    Some((name, password)) => (name, Some(password.to_string())),
                    None => (userinfo, None),
                };
                self.user = Some(UserInfo {
                    username: username.to_string(),
                    password,
                });
                host
            }
            None => authority,
        };

        check_escapes(host)?;
        if let Some(c) = host.chars().find(|&c| !is_host_char(c)) {
            return Err(ReferenceError::InvalidHost(c));
        }

        // IPv6 literals carry colons inside the brackets
        let port_area = host.rfind(']').map_or(host, |i| &host[i + 1..]);
        if let Some((_, port)) = port_area.rsplit_once(':') {
            if !port.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ReferenceError::InvalidPort(format!(":{port}")));
            }
        }

        self.host = host.to_string();
        Ok(())
    }

    /// Merges a URI reference into this URL in place.
    ///
    /// On error the URL is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] if `reference` is not a valid URI reference.
    pub fn merge(&mut self, reference: &str) -> Result<(), ReferenceError> {
        let parsed = Self::parse(reference)?;
        self.apply(parsed);
        Ok(())
    }

    fn apply(&mut self, mut reference: Self) {
        if reference.scheme.is_some() {
            self.scheme = reference.scheme;
        }
        if reference.user.is_some() {
            self.user = reference.user;
        }
        if !reference.host.is_empty() {
            self.host = reference.host;
        }
        if !reference.query.is_empty() || reference.force_query {
            self.query = reference.query;
        }

        if let Some(cut) = reference.path.find('&') {
            let appended = reference.path[cut + 1..].to_string();
            reference.path.truncate(cut);
            self.append_query(&appended);
        }

        if !reference.path.is_empty() {
            if reference.path.starts_with('/') {
                self.path = reference.path;
            } else {
                self.path = format!("{}/{}", self.path.trim_end_matches('/'), reference.path);
            }
        }

        self.fragment = reference.fragment;
    }

    /// Appends already-encoded `key=value` text to the query, joined with `&`.
    pub fn append_query(&mut self, raw: &str) {
        if !self.query.is_empty() {
            self.query.push('&');
        }
        self.query.push_str(raw);
    }

    /// Replaces the raw (encoded) query.
    pub fn set_query(&mut self, raw: impl Into<String>) {
        self.query = raw.into();
        self.force_query = false;
    }

    /// Replaces the scheme.
    pub fn set_scheme(&mut self, scheme: impl Into<String>) {
        self.scheme = Some(scheme.into());
    }

    /// Replaces the host (with optional `:port`).
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    /// Returns the scheme, if any.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Returns the user info, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    /// Returns the host including any port; empty when absent.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the escaped path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query without the leading `?`.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the fragment without the leading `#`.
    #[must_use]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }
}

impl fmt::Display for RequestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{scheme}:")?;
        }
        if !self.host.is_empty()
            || self.user.is_some()
            || (self.scheme.is_some() && self.path.starts_with('/'))
        {
            f.write_str("//")?;
            if let Some(user) = &self.user {
                write!(f, "{user}@")?;
            }
            f.write_str(&self.host)?;
        }
        if !self.host.is_empty() && !self.path.is_empty() && !self.path.starts_with('/') {
            f.write_str("/")?;
        }
        f.write_str(&self.path)?;
        if self.force_query || !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for RequestUrl {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Splits a leading `scheme:` off the reference.
fn split_scheme(reference: &str) -> Result<(Option<&str>, &str), ReferenceError> {
    for (i, c) in reference.char_indices() {
        match c {
            'a'..='z' | 'A'..='Z' => {}
            '0'..='9' | '+' | '-' | '.' if i > 0 => {}
            ':' if i == 0 => return Err(ReferenceError::MissingScheme),
            ':' => return Ok((Some(&reference[..i]), &reference[i + 1..])),
            _ => return Ok((None, reference)),
        }
    }
    Ok((None, reference))
}

fn check_escapes(component: &str) -> Result<(), ReferenceError> {
    let bytes = component.as_bytes();
    for (i, _) in component.match_indices('%') {
        let valid = bytes.len() > i + 2
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit();
        if !valid {
            let end = component.len().min(i + 3);
            let snippet = component.get(i..end).unwrap_or(&component[i..]);
            return Err(ReferenceError::InvalidEscape(snippet.to_string()));
        }
    }
    Ok(())
}

const fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || !c.is_ascii()
        || matches!(
            c,
            '-' | '.' | '_' | '~' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | ';'
                | '=' | ':' | '[' | ']' | '%'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_reference_verbatim() {
        for reference in [
            "//localhost/basepath?init=first",
            "https://u:p@inno.nl:80/newbase/3",
            "invalid:///anything?preset&reset=initial",
            "invalid:blopplop",
            "incomplete",
            "//test@0:80",
            "http://[::1]:8080/x#top",
        ] {
            let url = RequestUrl::parse(reference).unwrap();
            assert_eq!(url.to_string(), reference);
        }
    }

    #[test]
    fn test_parse_components() {
        let url = RequestUrl::parse("HTTPS://u:p@inno.nl:80/a/b?x=1&y#frag").unwrap();

        assert_eq!(url.scheme(), Some("https"));
        assert_eq!(url.user().unwrap().username(), "u");
        assert_eq!(url.user().unwrap().password(), Some("p"));
        assert_eq!(url.host(), "inno.nl:80");
        assert_eq!(url.path(), "/a/b");
        assert_eq!(url.query(), "x=1&y");
        assert_eq!(url.fragment(), "frag");
    }

    #[test]
    fn test_bare_question_mark_forces_query() {
        let url = RequestUrl::parse("/path?").unwrap();
        assert_eq!(url.query(), "");
        assert_eq!(url.to_string(), "/path?");
    }

    #[test]
    fn test_relative_reference_appends_path() {
        let mut url = RequestUrl::parse("//localhost/basepath?init=first").unwrap();
        url.merge("subpath/2?init=second#only+here").unwrap();

        assert_eq!(
            url.to_string(),
            "//localhost/basepath/subpath/2?init=second#only+here"
        );
    }

    #[test]
    fn test_absolute_path_replaces_and_clears_fragment() {
        let mut url =
            RequestUrl::parse("//localhost/basepath/subpath/2?init=second#only+here").unwrap();
        url.merge("/newbase/3").unwrap();

        assert_eq!(url.to_string(), "//localhost/newbase/3?init=second");
    }

    #[test]
    fn test_forced_empty_query_clears_parameters() {
        let mut url = RequestUrl::parse("//localhost/newbase/3?init=second").unwrap();
        url.merge("https://u:p@inno.nl:80?").unwrap();

        assert_eq!(url.to_string(), "https://u:p@inno.nl:80/newbase/3");
        assert_eq!(url.query(), "");
    }

    #[test]
    fn test_username_only_wipes_password() {
        let mut url = RequestUrl::parse("https://u:p@inno.nl:80/newbase/3").unwrap();
        url.merge("//test@").unwrap();

        let user = url.user().unwrap();
        assert_eq!(user.to_string(), "test");
        assert!(user.password().is_none());
        assert_eq!(url.host(), "inno.nl:80");
    }

    #[test]
    fn test_relative_join_trims_trailing_slash() {
        let mut url = RequestUrl::parse("http://host/api/").unwrap();
        url.merge("users").unwrap();
        assert_eq!(url.path(), "/api/users");
    }

    #[test]
    fn test_relative_join_onto_empty_path() {
        let mut url = RequestUrl::parse("http://host").unwrap();
        url.merge("users").unwrap();
        assert_eq!(url.to_string(), "http://host/users");
    }

    #[test]
    fn test_ampersand_appends_to_query() {
        let mut url = RequestUrl::parse("http:///anything?preset&reset=initial").unwrap();
        url.merge("?reset=updated").unwrap();
        url.merge("&reset=added").unwrap();

        assert_eq!(url.to_string(), "http:///anything?reset=updated&reset=added");
    }

    #[test]
    fn test_ampersand_splits_path_from_parameters() {
        let mut url = RequestUrl::parse("http://host/api").unwrap();
        url.merge("items&sort=asc").unwrap();

        assert_eq!(url.path(), "/api/items");
        assert_eq!(url.query(), "sort=asc");
    }

    #[test]
    fn test_escaped_ampersand_stays_in_path() {
        let mut url = RequestUrl::parse("http://host/api?a=1").unwrap();
        url.merge("tom%26jerry").unwrap();

        assert_eq!(url.path(), "/api/tom%26jerry");
        assert_eq!(url.query(), "a=1");
    }

    #[test]
    fn test_empty_reference_only_clears_fragment() {
        let mut url = RequestUrl::parse("http://host/api?a=1#top").unwrap();
        url.merge("").unwrap();
        assert_eq!(url.to_string(), "http://host/api?a=1");
    }

    #[test]
    fn test_scheme_only_reference() {
        let mut url = RequestUrl::parse("invalid:///anything?preset&reset=initial").unwrap();
        url.merge("https:").unwrap();
        assert_eq!(url.to_string(), "https:///anything?preset&reset=initial");
    }

    #[test]
    fn test_merge_function_leaves_base_untouched() {
        let base = RequestUrl::parse("//localhost/basepath?init=first").unwrap();
        let first = merge(Some(&base), "subpath").unwrap();
        let second = merge(Some(&first), "/other?x=1").unwrap();

        assert_eq!(base.to_string(), "//localhost/basepath?init=first");
        assert_eq!(first.to_string(), "//localhost/basepath/subpath?init=first");
        assert_eq!(second.to_string(), "//localhost/other?x=1");
    }

    #[test]
    fn test_merge_without_base_parses_reference() {
        let url = merge(None, "items&sort=asc").unwrap();
        assert_eq!(url.path(), "items&sort=asc");
    }

    #[test]
    fn test_failed_merge_leaves_url_unchanged() {
        let mut url = RequestUrl::parse("http://host/api?a=1").unwrap();
        let result = url.merge("bad%zzescape");

        assert_eq!(result, Err(ReferenceError::InvalidEscape("%zz".to_string())));
        assert_eq!(url.to_string(), "http://host/api?a=1");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            RequestUrl::parse("http://host/\u{7f}"),
            Err(ReferenceError::ControlCharacter)
        );
        assert_eq!(
            RequestUrl::parse(":nothing"),
            Err(ReferenceError::MissingScheme)
        );
        assert_eq!(
            RequestUrl::parse("1a:b/c"),
            Err(ReferenceError::ColonInFirstSegment)
        );
        assert_eq!(
            RequestUrl::parse("http://host:http/"),
            Err(ReferenceError::InvalidPort(":http".to_string()))
        );
        assert_eq!(
            RequestUrl::parse("http://ho st/"),
            Err(ReferenceError::InvalidHost(' '))
        );
        assert_eq!(
            RequestUrl::parse("/x?q=%4"),
            Err(ReferenceError::InvalidEscape("%4".to_string()))
        );
    }

    #[test]
    fn test_from_str() {
        let url: RequestUrl = "http://host/x".parse().unwrap();
        assert_eq!(url.host(), "host");
    }
}
