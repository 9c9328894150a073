/*!
Visitor and administrator accounts.
*/
use serde::Serialize;
use time::OffsetDateTime;

/// Closed set of account roles. The signup form offers the visitor
/// subtypes; `Admin` accounts are only ever seeded or created by hand.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Role {
    Student,
    Teacher,
    Staff,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Student => "Student",
            Role::Teacher => "Teacher",
            Role::Staff   => "Staff",
            Role::Admin   => "Admin",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Student" => Ok(Role::Student),
            "Teacher" => Ok(Role::Teacher),
            "Staff"   => Ok(Role::Staff),
            "Admin"   => Ok(Role::Admin),
            _ => Err(format!("{:?} is not a valid Role.", s)),
        }
    }
}

/// A user account as stored. The session holds a snapshot of this for
/// the duration of a login; the database copy is authoritative.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    /// Best quiz score, if the user has ever played.
    pub score: Option<i32>,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub verification_code: Option<String>,
    #[serde(skip)]
    pub reset_token: Option<String>,
    #[serde(skip)]
    pub reset_expires: Option<OffsetDateTime>,
}

impl User {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        for role in [Role::Student, Role::Teacher, Role::Staff, Role::Admin] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn bogus_role_rejected() {
        assert!("admin".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
        assert!("Visitor".parse::<Role>().is_err());
    }
}
