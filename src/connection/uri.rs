use std::fmt;
use std::path::PathBuf;

/// Location of a store served by the reference connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    /// Process-local store shared by name: `memory://<name>`
    Memory { name: String },
    /// Store snapshot persisted to a file: `file://<path>`
    File { path: PathBuf },
}

impl StoreUri {
    /// Parse from connection string
    ///
    /// Format: "memory://name" or "file:///absolute/path" or "file://relative/path"
    ///
    /// # Examples
    ///
    /// ```
    /// use rustmigrate::connection::StoreUri;
    ///
    /// let uri = StoreUri::parse("memory://staging").unwrap();
    /// assert_eq!(uri, StoreUri::Memory { name: "staging".to_string() });
    /// ```
    pub fn parse(uri: &str) -> Result<Self, String> {
        let uri = uri.trim();
        let (scheme, location) = uri
            .split_once("://")
            .ok_or_else(|| format!("URI '{}' must look like <scheme>://<location>", uri))?;

        if location.is_empty() {
            return Err(format!("URI '{}' has an empty location", uri));
        }

        match scheme.to_ascii_lowercase().as_str() {
            "memory" => {
                if location.contains('/') {
                    return Err(format!(
                        "Invalid memory store name '{}': '/' is not allowed",
                        location
                    ));
                }
                Ok(StoreUri::Memory {
                    name: location.to_string(),
                })
            }
            "file" => Ok(StoreUri::File {
                path: PathBuf::from(location),
            }),
            other => Err(format!(
                "Unsupported URI scheme '{}': only 'memory://' and 'file://' are supported",
                other
            )),
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreUri::Memory { name } => write!(f, "memory://{}", name),
            StoreUri::File { path } => write!(f, "file://{}", path.display()),
        }
    }
}
