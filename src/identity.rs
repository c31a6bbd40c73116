//! Caller identity as resolved by the upstream credential layer
use super::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Employee,
    Hr,
}

/// Identity attached to an incoming operation. Credential verification is
/// upstream of this crate; the workflow only ever sees the resolved pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn employee(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: Role::Employee,
        }
    }

    pub fn hr(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: Role::Hr,
        }
    }
}

pub fn require_role(user: &CurrentUser, role: Role) -> Result<(), WorkflowError> {
    if user.role == role {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_gate() {
        let hr = CurrentUser::hr("hr@example.com");
        assert!(require_role(&hr, Role::Hr).is_ok());
        assert!(matches!(
            require_role(&hr, Role::Employee),
            Err(WorkflowError::Unauthorized)
        ));
    }
}
