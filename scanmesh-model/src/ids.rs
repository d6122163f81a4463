use std::fmt;

/// Organization identifier as issued by the tenant registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct OrgId(pub i32);

/// Scan group identifier, unique within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct GroupId(pub i32);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for OrgId {
    fn from(value: i32) -> Self {
        OrgId(value)
    }
}

impl From<i32> for GroupId {
    fn from(value: i32) -> Self {
        GroupId(value)
    }
}

/// The (organization, group) pair every coordination key is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupScope {
    pub org_id: OrgId,
    pub group_id: GroupId,
}

impl GroupScope {
    pub fn new(org_id: impl Into<OrgId>, group_id: impl Into<GroupId>) -> Self {
        Self {
            org_id: org_id.into(),
            group_id: group_id.into(),
        }
    }
}

impl fmt::Display for GroupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.org_id, self.group_id)
    }
}
