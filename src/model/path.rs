//! LWM2M paths: `/object/instance/resource/resource-instance`

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::storage::ID_ANY;

/// A 4-level LWM2M path `/objectId/instanceId/resourceId/resourceInstanceId`
///
/// Any suffix may be unset to address a coarser scope. A set level always
/// implies every level above it is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Path {
    pub object: Option<u16>,
    pub instance: Option<u16>,
    pub resource: Option<u16>,
    pub resource_instance: Option<u16>,
}

impl Path {
    /// The root path `/`
    pub const fn root() -> Self {
        Self {
            object: None,
            instance: None,
            resource: None,
            resource_instance: None,
        }
    }

    pub const fn object(object: u16) -> Self {
        Self {
            object: Some(object),
            ..Self::root()
        }
    }

    pub const fn instance(object: u16, instance: u16) -> Self {
        Self {
            object: Some(object),
            instance: Some(instance),
            ..Self::root()
        }
    }

    pub const fn resource(object: u16, instance: u16, resource: u16) -> Self {
        Self {
            object: Some(object),
            instance: Some(instance),
            resource: Some(resource),
            resource_instance: None,
        }
    }

    pub const fn resource_instance(
        object: u16,
        instance: u16,
        resource: u16,
        resource_instance: u16,
    ) -> Self {
        Self {
            object: Some(object),
            instance: Some(instance),
            resource: Some(resource),
            resource_instance: Some(resource_instance),
        }
    }

    /// Number of set levels, 0 for the root
    pub fn depth(&self) -> usize {
        [
            self.object,
            self.instance,
            self.resource,
            self.resource_instance,
        ]
        .iter()
        .take_while(|level| level.is_some())
        .count()
    }

    pub fn is_root(&self) -> bool {
        self.object.is_none()
    }

    /// True when every level set on `self` matches `other`
    pub fn contains(&self, other: &Path) -> bool {
        let levels = [
            (self.object, other.object),
            (self.instance, other.instance),
            (self.resource, other.resource),
            (self.resource_instance, other.resource_instance),
        ];
        levels
            .iter()
            .all(|(scope, level)| scope.is_none() || scope == level)
    }

    /// Parses `/3/0/1`, `3/0/`, `/` and similar forms
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let mut levels = [None; 4];
        if !trimmed.is_empty() {
            for (depth, segment) in trimmed.split('/').enumerate() {
                if depth >= levels.len() {
                    return Err(Error::InvalidValue);
                }
                levels[depth] = Some(parse_segment(segment)?);
            }
        }

        Ok(Self {
            object: levels[0],
            instance: levels[1],
            resource: levels[2],
            resource_instance: levels[3],
        })
    }
}

fn parse_segment(segment: &str) -> Result<u16> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::format(format!("invalid path segment '{segment}'")));
    }

    // Digits only: any parse failure here is an overflow
    let value: u64 = segment.parse().map_err(|_| Error::InvalidValue)?;
    if value >= u64::from(ID_ANY) {
        return Err(Error::InvalidValue);
    }
    Ok(value as u16)
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        for level in [
            self.object,
            self.instance,
            self.resource,
            self.resource_instance,
        ]
        .into_iter()
        .map_while(|level| level)
        {
            write!(f, "/{level}")?;
        }
        Ok(())
    }
}
