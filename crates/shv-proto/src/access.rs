//! Access levels (§3.4, §6.5): a linear permission scale plus the legacy
//! comma-separated "granted access" string format older brokers still send.

/// A point on the linear access-level scale. Ordering is numeric: any
/// level compares correctly against any other with `<`/`>=`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccessLevel(pub i32);

impl AccessLevel {
    pub const NONE: AccessLevel = AccessLevel(0);
    pub const BROWSE: AccessLevel = AccessLevel(1);
    pub const READ: AccessLevel = AccessLevel(8);
    pub const WRITE: AccessLevel = AccessLevel(16);
    pub const COMMAND: AccessLevel = AccessLevel(24);
    pub const CONFIG: AccessLevel = AccessLevel(32);
    pub const SERVICE: AccessLevel = AccessLevel(40);
    pub const SUPER_SERVICE: AccessLevel = AccessLevel(48);
    pub const DEVEL: AccessLevel = AccessLevel(56);
    pub const ADMIN: AccessLevel = AccessLevel(63);

    /// The legacy token for this level, if it has a canonical one. Levels
    /// that fall between two named levels (`rpcurl`-customized deployments
    /// do this) have no single token and round-trip only through the
    /// numeric form.
    pub fn legacy_token(self) -> Option<&'static str> {
        Some(match self {
            AccessLevel::NONE => return None,
            AccessLevel::BROWSE => "bws",
            AccessLevel::READ => "rd",
            AccessLevel::WRITE => "wr",
            AccessLevel::COMMAND => "cmd",
            AccessLevel::CONFIG => "cfg",
            AccessLevel::SERVICE => "srv",
            AccessLevel::SUPER_SERVICE => "ssrv",
            AccessLevel::DEVEL => "dev",
            AccessLevel::ADMIN => "su",
            _ => return None,
        })
    }

    fn from_legacy_token(tok: &str) -> Option<AccessLevel> {
        Some(match tok {
            "bws" => AccessLevel::BROWSE,
            "rd" => AccessLevel::READ,
            "wr" => AccessLevel::WRITE,
            "cmd" => AccessLevel::COMMAND,
            "cfg" => AccessLevel::CONFIG,
            "srv" => AccessLevel::SERVICE,
            "ssrv" => AccessLevel::SUPER_SERVICE,
            "dev" => AccessLevel::DEVEL,
            "su" => AccessLevel::ADMIN,
            _ => return None,
        })
    }
}

/// Parse a legacy comma-separated "granted access" string
/// (`rpcaccess_granted_extract`) into the highest access level it grants,
/// plus the list of tokens that weren't recognized access-level tokens
/// (kept verbatim — a broker may stuff extra capability tags in here).
pub fn granted_access_extract(granted: &str) -> (AccessLevel, Vec<String>) {
    let mut level = AccessLevel::NONE;
    let mut extra = Vec::new();
    for tok in granted.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match AccessLevel::from_legacy_token(tok) {
            Some(l) if l > level => level = l,
            Some(_) => {}
            None => extra.push(tok.to_string()),
        }
    }
    (level, extra)
}

/// Render an access level (plus any extra capability tokens) back into the
/// legacy comma-separated string form.
pub fn granted_access_str(level: AccessLevel, extra: &[String]) -> String {
    let mut parts = Vec::new();
    if let Some(tok) = level.legacy_token() {
        parts.push(tok.to_string());
    }
    parts.extend(extra.iter().cloned());
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_numeric() {
        assert!(AccessLevel::READ < AccessLevel::WRITE);
        assert!(AccessLevel::ADMIN > AccessLevel::SUPER_SERVICE);
    }

    #[test]
    fn extract_picks_highest_known_level() {
        let (level, extra) = granted_access_extract("bws,wr,rd");
        assert_eq!(level, AccessLevel::WRITE);
        assert!(extra.is_empty());
    }

    #[test]
    fn extract_keeps_unknown_tokens() {
        let (level, extra) = granted_access_extract("rd,dot-local,perm:foo");
        assert_eq!(level, AccessLevel::READ);
        assert_eq!(extra, vec!["dot-local".to_string(), "perm:foo".to_string()]);
    }

    #[test]
    fn roundtrip_through_string_form() {
        let (level, extra) = granted_access_extract("cfg,custom-tag");
        let s = granted_access_str(level, &extra);
        assert_eq!(s, "cfg,custom-tag");
    }
}
