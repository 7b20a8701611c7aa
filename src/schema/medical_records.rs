use sea_orm_migration::prelude::*;

use super::{patients::Patients, timestamp_columns, users::Users};

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.has_table("medical_records").await? {
        return Ok(());
    }

    let [created_at, updated_at] =
        timestamp_columns(MedicalRecords::CreatedAt, MedicalRecords::UpdatedAt);
    manager
        .create_table(
            Table::create()
                .table(MedicalRecords::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(MedicalRecords::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(MedicalRecords::PatientId).integer().not_null())
                .col(ColumnDef::new(MedicalRecords::DoctorId).integer().not_null())
                .col(
                    ColumnDef::new(MedicalRecords::RecordType)
                        .string_len(100)
                        .not_null(),
                )
                .col(ColumnDef::new(MedicalRecords::Diagnosis).text())
                .col(ColumnDef::new(MedicalRecords::Symptoms).text())
                .col(ColumnDef::new(MedicalRecords::Treatment).text())
                .col(ColumnDef::new(MedicalRecords::Notes).text())
                .col(ColumnDef::new(MedicalRecords::RecordDate).date().not_null())
                .col(created_at)
                .col(updated_at)
                .foreign_key(
                    ForeignKey::create()
                        .name("medical_records_patient_fk")
                        .from(MedicalRecords::Table, MedicalRecords::PatientId)
                        .to(Patients::Table, Patients::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("medical_records_doctor_fk")
                        .from(MedicalRecords::Table, MedicalRecords::DoctorId)
                        .to(Users::Table, Users::Id),
                )
                .to_owned(),
        )
        .await?;

    Ok(())
}

#[derive(Iden)]
enum MedicalRecords {
    Table,
    Id,
    PatientId,
    DoctorId,
    RecordType,
    Diagnosis,
    Symptoms,
    Treatment,
    Notes,
    RecordDate,
    CreatedAt,
    UpdatedAt,
}
