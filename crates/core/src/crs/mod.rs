//! Coordinate reference systems

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system, by EPSG code, WKT or PROJ string.
///
/// basinkit never reprojects: the CRS travels with data so that
/// mismatched inputs can be reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    wkt: Option<String>,
    epsg: Option<u32>,
    proj: Option<String>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Parse a CRS name as found in GeoJSON `crs` members.
    ///
    /// Accepts `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326` and
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`. Anything else is kept as a PROJ-like
    /// identifier.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        if trimmed.ends_with("CRS84") {
            return Self::wgs84();
        }
        let code = trimmed
            .rsplit(':')
            .next()
            .filter(|_| trimmed.to_ascii_uppercase().contains("EPSG"))
            .and_then(|c| c.parse::<u32>().ok());
        match code {
            Some(code) => Self::from_epsg(code),
            None => Self::from_proj(trimmed),
        }
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether two CRS definitions can be treated as the same.
    ///
    /// EPSG codes are compared when both are known, otherwise the textual
    /// definitions must match exactly.
    pub fn is_compatible(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }
        false
    }

    /// OGC URN for GeoJSON output, when the EPSG code is known
    pub fn urn(&self) -> Option<String> {
        self.epsg.map(|code| format!("urn:ogc:def:crs:EPSG::{}", code))
    }

    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(CRS::from_name("EPSG:32637").epsg(), Some(32637));
        assert_eq!(CRS::from_name("urn:ogc:def:crs:EPSG::4326").epsg(), Some(4326));
        assert_eq!(CRS::from_name("urn:ogc:def:crs:OGC:1.3:CRS84").epsg(), Some(4326));
        assert_eq!(CRS::from_name("+proj=longlat").proj(), Some("+proj=longlat"));
    }

    #[test]
    fn test_compatibility() {
        assert!(CRS::from_epsg(4326).is_compatible(&CRS::wgs84()));
        assert!(!CRS::from_epsg(4326).is_compatible(&CRS::from_epsg(32637)));
        assert!(!CRS::from_epsg(4326).is_compatible(&CRS::from_wkt("GEOGCS[...]")));
        assert_eq!(CRS::from_epsg(4326).urn().as_deref(), Some("urn:ogc:def:crs:EPSG::4326"));
    }
}
