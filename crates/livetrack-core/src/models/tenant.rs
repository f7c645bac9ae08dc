use serde::{Deserialize, Serialize};

/// Deployment tenant. Each tenant is pinned to one organization, which is
/// selected automatically when the filter form has none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tenant {
    #[serde(rename = "ithraa")]
    Ithraa,
    #[serde(rename = "novotel")]
    Novotel,
    #[serde(rename = "rawafMina")]
    RawafMina,
    #[serde(rename = "Makkah")]
    Makkah,
    #[serde(rename = "ithraaAljoud")]
    IthraaAljoud,
}

impl Tenant {
    pub fn from_profile(profile: &str) -> Option<Self> {
        match profile {
            "ithraa" => Some(Self::Ithraa),
            "novotel" => Some(Self::Novotel),
            "rawafMina" => Some(Self::RawafMina),
            "Makkah" => Some(Self::Makkah),
            "ithraaAljoud" => Some(Self::IthraaAljoud),
            _ => None,
        }
    }

    pub fn organization_id(&self) -> u32 {
        match self {
            Self::Ithraa => 2,
            Self::Novotel => 5,
            Self::RawafMina => 6,
            Self::Makkah => 7,
            Self::IthraaAljoud => 8,
        }
    }
}
