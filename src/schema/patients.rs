use sea_orm_migration::prelude::*;

use super::{text_in, timestamp_columns, users::Users};

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.has_table("patients").await? {
        return Ok(());
    }

    let [created_at, updated_at] = timestamp_columns(Patients::CreatedAt, Patients::UpdatedAt);
    manager
        .create_table(
            Table::create()
                .table(Patients::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Patients::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Patients::UserId).integer().not_null())
                .col(ColumnDef::new(Patients::PatientId).string_len(50).not_null())
                .col(ColumnDef::new(Patients::DateOfBirth).date())
                .col(ColumnDef::new(Patients::Gender).string_len(20))
                .col(ColumnDef::new(Patients::Phone).string_len(20))
                .col(ColumnDef::new(Patients::Address).text())
                .col(ColumnDef::new(Patients::EmergencyContactName).string_len(100))
                .col(ColumnDef::new(Patients::EmergencyContactPhone).string_len(20))
                .col(ColumnDef::new(Patients::BloodType).string_len(10))
                .col(ColumnDef::new(Patients::Allergies).text())
                .col(ColumnDef::new(Patients::MedicalHistory).text())
                .col(
                    ColumnDef::new(Patients::Status)
                        .string_len(50)
                        .not_null()
                        .default("active")
                        .check(text_in(
                            Patients::Status,
                            &["active", "discharged", "transferred"],
                        )),
                )
                .col(ColumnDef::new(Patients::AssignedDoctorId).integer())
                .col(ColumnDef::new(Patients::AssignedNurseId).integer())
                .col(created_at)
                .col(updated_at)
                .foreign_key(
                    ForeignKey::create()
                        .name("patients_user_fk")
                        .from(Patients::Table, Patients::UserId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("patients_assigned_doctor_fk")
                        .from(Patients::Table, Patients::AssignedDoctorId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("patients_assigned_nurse_fk")
                        .from(Patients::Table, Patients::AssignedNurseId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .to_owned(),
        )
        .await?;

    for (name, column) in [
        ("patients_patient_id_unique", Patients::PatientId),
        ("patients_user_id_unique", Patients::UserId),
    ] {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name(name)
                    .table(Patients::Table)
                    .col(column)
                    .unique()
                    .to_owned(),
            )
            .await?;
    }

    Ok(())
}

#[derive(Iden)]
pub(super) enum Patients {
    Table,
    Id,
    UserId,
    PatientId,
    DateOfBirth,
    Gender,
    Phone,
    Address,
    EmergencyContactName,
    EmergencyContactPhone,
    BloodType,
    Allergies,
    MedicalHistory,
    Status,
    AssignedDoctorId,
    AssignedNurseId,
    CreatedAt,
    UpdatedAt,
}
