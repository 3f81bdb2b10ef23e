use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LeadId(pub i64);

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome tracking for a lead across call attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    MeetingBooked,
    NotInterested,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::MeetingBooked => "meeting_booked",
            Self::NotInterested => "not_interested",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "meeting_booked" => Some(Self::MeetingBooked),
            "not_interested" => Some(Self::NotInterested),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub company: String,
    pub role: String,
    pub phone: String,
    pub notes: Option<String>,
    pub status: LeadStatus,
}

impl Lead {
    /// First name used when addressing the contact; empty names fall back
    /// to a neutral greeting.
    pub fn first_name(&self) -> Option<&str> {
        self.name.split_whitespace().next().filter(|part| !part.is_empty())
    }
}
