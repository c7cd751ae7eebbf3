#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    SiteSupervisor = 3,
    Worker = 4,
    /// A fingerprint terminal posting scans
    Device = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::SiteSupervisor),
            4 => Some(Role::Worker),
            5 => Some(Role::Device),
            _ => None,
        }
    }
}
