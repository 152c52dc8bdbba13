use crate::db::models::user_models::UserRole;
use crate::error::Error;

/// Actions recognized by the authorization guard. Every mutating operation
/// in the services calls `authorize` before touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewCameras,
    ManageCameras,
    ManageUsers,
    AcknowledgeIncident,
    ViewIncidents,
    ViewAuditLog,
}

/// Map a session role to an allow/deny decision for one action. The match
/// is exhaustive over both enums, so adding a role or action forces every
/// rule to be revisited.
pub fn authorize(role: UserRole, action: Action) -> Result<(), Error> {
    let allowed = match action {
        Action::ManageCameras | Action::ManageUsers | Action::ViewAuditLog => {
            role == UserRole::Admin
        }
        Action::ViewCameras | Action::AcknowledgeIncident | Action::ViewIncidents => match role {
            UserRole::Admin | UserRole::Operator => true,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(Error::Authorization(format!(
            "Role {} may not perform {:?}",
            role.as_str(),
            action
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [Action; 6] = [
        Action::ViewCameras,
        Action::ManageCameras,
        Action::ManageUsers,
        Action::AcknowledgeIncident,
        Action::ViewIncidents,
        Action::ViewAuditLog,
    ];

    #[test]
    fn admin_is_allowed_everything() {
        for action in ALL_ACTIONS {
            assert!(authorize(UserRole::Admin, action).is_ok(), "{:?}", action);
        }
    }

    #[test]
    fn operator_is_denied_management_only() {
        for action in ALL_ACTIONS {
            let result = authorize(UserRole::Operator, action);
            match action {
                Action::ManageCameras | Action::ManageUsers | Action::ViewAuditLog => {
                    assert!(
                        matches!(result, Err(Error::Authorization(_))),
                        "{:?} should be denied",
                        action
                    );
                }
                _ => assert!(result.is_ok(), "{:?} should be allowed", action),
            }
        }
    }
}
