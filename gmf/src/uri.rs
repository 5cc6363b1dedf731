//! Parsing for the `scheme://[user[:pass]@]host[:port][/path][?query][#fragment]` grammar
//! used to address I/O endpoints.

use std::fmt;

use crate::error::{Error, Result};

/// A parsed URI, broken into the parts the I/O layer and the pool's scheme dispatch need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    /// The scheme, lower-cased (`file`, `http`, `https`, `embed`, or a backend-registered
    /// one).
    pub scheme: String,
    /// The `user` component of `user[:pass]@host`, if present.
    pub username: Option<String>,
    /// The `pass` component, if present.
    pub password: Option<String>,
    /// The host component. Empty for schemes like `embed://name` that do not use a host.
    pub host: String,
    /// The port, if explicitly given.
    pub port: Option<u16>,
    /// The path, including its leading `/` if present; empty if none.
    pub path: String,
    /// The query string, without its leading `?`.
    pub query: Option<String>,
    /// The fragment, without its leading `#`.
    pub fragment: Option<String>,
}

impl fmt::Display for Uri {
    /// Re-serialises this URI back into `scheme://[user[:pass]@]host[:port][/path][?query][#fragment]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(user) = &self.username {
            write!(f, "{user}")?;
            if let Some(pass) = &self.password {
                write!(f, ":{pass}")?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Parses a URI of the form `scheme://[user[:pass]@]host[:port][/path][?query][#fragment]`.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if the input has no `://` separator or carries a
/// malformed port.
pub fn parse(input: &str) -> Result<Uri> {
    let (scheme, rest) = input
        .split_once("://")
        .ok_or_else(|| Error::invalid_argument(format!("uri '{input}' has no scheme separator")))?;
    if scheme.is_empty() {
        return Err(Error::invalid_argument("uri has an empty scheme"));
    }

    let (authority_and_path, fragment) = match rest.split_once('#') {
        Some((head, frag)) => (head, Some(frag.to_string())),
        None => (rest, None),
    };
    let (authority_and_path, query) = match authority_and_path.split_once('?') {
        Some((head, q)) => (head, Some(q.to_string())),
        None => (authority_and_path, None),
    };

    let (authority, path) = match authority_and_path.find('/') {
        Some(idx) => (&authority_and_path[..idx], authority_and_path[idx..].to_string()),
        None => (authority_and_path, String::new()),
    };

    let (userinfo, host_port) = match authority.split_once('@') {
        Some((userinfo, host_port)) => (Some(userinfo), host_port),
        None => (None, authority),
    };

    let (username, password) = match userinfo {
        Some(userinfo) => match userinfo.split_once(':') {
            Some((u, p)) => (Some(u.to_string()), Some(p.to_string())),
            None => (Some(userinfo.to_string()), None),
        },
        None => (None, None),
    };

    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str
                .parse::<u16>()
                .map_err(|_| Error::invalid_argument(format!("invalid port '{port_str}'")))?;
            (host.to_string(), Some(port))
        }
        None => (host_port.to_string(), None),
    };

    Ok(Uri { scheme: scheme.to_lowercase(), username, password, host, port, path, query, fragment })
}
