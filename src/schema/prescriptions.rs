use sea_orm_migration::prelude::*;

use super::{patients::Patients, text_in, timestamp_columns, users::Users};

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.has_table("prescriptions").await? {
        return Ok(());
    }

    let [created_at, updated_at] =
        timestamp_columns(Prescriptions::CreatedAt, Prescriptions::UpdatedAt);
    manager
        .create_table(
            Table::create()
                .table(Prescriptions::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Prescriptions::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Prescriptions::PatientId).integer().not_null())
                .col(ColumnDef::new(Prescriptions::DoctorId).integer().not_null())
                .col(
                    ColumnDef::new(Prescriptions::MedicationName)
                        .string_len(255)
                        .not_null(),
                )
                .col(ColumnDef::new(Prescriptions::Dosage).string_len(100))
                .col(ColumnDef::new(Prescriptions::Frequency).string_len(100))
                .col(ColumnDef::new(Prescriptions::Duration).string_len(100))
                .col(ColumnDef::new(Prescriptions::Instructions).text())
                .col(
                    ColumnDef::new(Prescriptions::Status)
                        .string_len(50)
                        .not_null()
                        .default("active")
                        .check(text_in(
                            Prescriptions::Status,
                            &["active", "completed", "cancelled"],
                        )),
                )
                .col(ColumnDef::new(Prescriptions::PrescribedDate).date().not_null())
                .col(created_at)
                .col(updated_at)
                .foreign_key(
                    ForeignKey::create()
                        .name("prescriptions_patient_fk")
                        .from(Prescriptions::Table, Prescriptions::PatientId)
                        .to(Patients::Table, Patients::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("prescriptions_doctor_fk")
                        .from(Prescriptions::Table, Prescriptions::DoctorId)
                        .to(Users::Table, Users::Id),
                )
                .to_owned(),
        )
        .await?;

    Ok(())
}

#[derive(Iden)]
enum Prescriptions {
    Table,
    Id,
    PatientId,
    DoctorId,
    MedicationName,
    Dosage,
    Frequency,
    Duration,
    Instructions,
    Status,
    PrescribedDate,
    CreatedAt,
    UpdatedAt,
}
