//! Row visibility by caller role. Every list and detail read goes through
//! [`Scope`] so the narrowing rules live in one place.

use crate::{
    entities::enums::{NoticeAudience, Role},
    error::{ServiceError, ServiceResult},
    repo::patients::PatientsRepo,
};

/// Authenticated caller as resolved from the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub account_id: i32,
    pub role: Role,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Patients,
    Appointments,
    Prescriptions,
    MedicalRecords,
}

/// Ownership filters of a list query. `patient_id` is a patient profile key,
/// `doctor_id` an account key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ownership {
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Narrowed {
    /// The caller may not see any row.
    Nothing,
    Rows(Ownership),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scope {
    pub caller: Caller,
    /// Patient profile of a patient caller, if one exists.
    pub own_patient_id: Option<i32>,
}

impl Scope {
    /// Looks up the caller's own patient profile when the role needs it.
    pub async fn resolve(caller: Caller, patients: &dyn PatientsRepo) -> ServiceResult<Self> {
        let own_patient_id = if caller.role == Role::Patient {
            patients
                .find_by_user_id(caller.account_id)
                .await
                .map_err(ServiceError::db("patient scope lookup"))?
                .map(|patient| patient.id)
        } else {
            None
        };
        Ok(Self {
            caller,
            own_patient_id,
        })
    }

    /// Effective ownership filters for a list query. Requested filters that
    /// the caller may not widen are overwritten.
    pub fn narrow(&self, resource: Resource, requested: Ownership) -> Narrowed {
        let mut effective = requested;
        match self.caller.role {
            Role::Patient => match self.own_patient_id {
                Some(own) => effective.patient_id = Some(own),
                None => return Narrowed::Nothing,
            },
            Role::Doctor
                if matches!(resource, Resource::Prescriptions | Resource::Appointments) =>
            {
                effective.doctor_id = Some(self.caller.account_id);
            }
            _ => {}
        }
        Narrowed::Rows(effective)
    }

    /// Whether a single row with the given owners is visible to the caller.
    pub fn permits(&self, resource: Resource, row: Ownership) -> bool {
        match self.narrow(resource, Ownership::default()) {
            Narrowed::Nothing => false,
            Narrowed::Rows(filters) => {
                filters.patient_id.map_or(true, |id| row.patient_id == Some(id))
                    && filters.doctor_id.map_or(true, |id| row.doctor_id == Some(id))
            }
        }
    }

    /// Audiences whose notices the caller may read. `None` means unrestricted.
    /// Only admins may pick a specific audience.
    pub fn notice_audiences(&self, requested: Option<NoticeAudience>) -> Option<Vec<NoticeAudience>> {
        match NoticeAudience::for_role(self.caller.role) {
            None => requested.map(|audience| vec![audience]),
            Some(group) => Some(vec![NoticeAudience::All, group]),
        }
    }

    pub fn require(&self, roles: &[Role]) -> ServiceResult<()> {
        if roles.contains(&self.caller.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(role: Role, own_patient_id: Option<i32>) -> Scope {
        Scope {
            caller: Caller {
                account_id: 10,
                role,
            },
            own_patient_id,
        }
    }

    fn requested(patient_id: i32, doctor_id: i32) -> Ownership {
        Ownership {
            patient_id: Some(patient_id),
            doctor_id: Some(doctor_id),
        }
    }

    #[test]
    fn patient_filter_is_replaced_by_own_profile() {
        let patient = scope(Role::Patient, Some(3));
        for resource in [
            Resource::Patients,
            Resource::Appointments,
            Resource::Prescriptions,
            Resource::MedicalRecords,
        ] {
            assert_eq!(
                patient.narrow(resource, requested(99, 7)),
                Narrowed::Rows(Ownership {
                    patient_id: Some(3),
                    doctor_id: Some(7),
                })
            );
        }
    }

    #[test]
    fn patient_without_profile_sees_nothing() {
        let patient = scope(Role::Patient, None);
        assert_eq!(
            patient.narrow(Resource::Appointments, Ownership::default()),
            Narrowed::Nothing
        );
        assert!(!patient.permits(Resource::Appointments, requested(1, 1)));
    }

    #[test]
    fn doctor_is_pinned_on_prescriptions_and_appointments() {
        let doctor = scope(Role::Doctor, None);
        assert_eq!(
            doctor.narrow(Resource::Prescriptions, requested(4, 77)),
            Narrowed::Rows(requested(4, 10))
        );
        assert_eq!(
            doctor.narrow(Resource::Appointments, requested(4, 77)),
            Narrowed::Rows(requested(4, 10))
        );
        assert_eq!(
            doctor.narrow(Resource::MedicalRecords, requested(4, 77)),
            Narrowed::Rows(requested(4, 77))
        );
    }

    #[test]
    fn staff_roles_keep_requested_filters() {
        for role in [Role::Admin, Role::Nurse, Role::Staff] {
            assert_eq!(
                scope(role, None).narrow(Resource::MedicalRecords, requested(5, 6)),
                Narrowed::Rows(requested(5, 6))
            );
        }
    }

    #[test]
    fn single_rows_follow_the_same_rules() {
        let patient = scope(Role::Patient, Some(3));
        assert!(patient.permits(Resource::MedicalRecords, requested(3, 1)));
        assert!(!patient.permits(Resource::MedicalRecords, requested(4, 1)));

        let doctor = scope(Role::Doctor, None);
        assert!(doctor.permits(Resource::Prescriptions, requested(4, 10)));
        assert!(!doctor.permits(Resource::Prescriptions, requested(4, 11)));
        assert!(!doctor.permits(Resource::Appointments, requested(4, 11)));
        assert!(doctor.permits(Resource::Appointments, requested(4, 10)));
        assert!(doctor.permits(Resource::MedicalRecords, requested(4, 11)));
    }

    #[test]
    fn notices_are_limited_to_all_and_own_group() {
        assert_eq!(
            scope(Role::Nurse, None).notice_audiences(Some(NoticeAudience::Doctors)),
            Some(vec![NoticeAudience::All, NoticeAudience::Nurses])
        );
        assert_eq!(
            scope(Role::Patient, Some(1)).notice_audiences(None),
            Some(vec![NoticeAudience::All, NoticeAudience::Patients])
        );
        assert_eq!(scope(Role::Admin, None).notice_audiences(None), None);
        assert_eq!(
            scope(Role::Admin, None).notice_audiences(Some(NoticeAudience::Staff)),
            Some(vec![NoticeAudience::Staff])
        );
    }

    #[test]
    fn require_checks_role_membership() {
        assert!(scope(Role::Nurse, None).require(&[Role::Admin, Role::Nurse]).is_ok());
        assert!(matches!(
            scope(Role::Staff, None).require(&[Role::Admin]),
            Err(ServiceError::Forbidden)
        ));
    }
}
