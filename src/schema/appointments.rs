use sea_orm_migration::prelude::*;

use super::{patients::Patients, text_in, timestamp_columns, users::Users};

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.has_table("appointments").await? {
        return Ok(());
    }

    let [created_at, updated_at] =
        timestamp_columns(Appointments::CreatedAt, Appointments::UpdatedAt);
    manager
        .create_table(
            Table::create()
                .table(Appointments::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Appointments::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Appointments::PatientId).integer().not_null())
                .col(ColumnDef::new(Appointments::DoctorId).integer().not_null())
                .col(ColumnDef::new(Appointments::AppointmentDate).date().not_null())
                .col(ColumnDef::new(Appointments::AppointmentTime).time().not_null())
                .col(ColumnDef::new(Appointments::Reason).text())
                .col(
                    ColumnDef::new(Appointments::Status)
                        .string_len(50)
                        .not_null()
                        .default("scheduled")
                        .check(text_in(
                            Appointments::Status,
                            &["scheduled", "completed", "cancelled", "rescheduled"],
                        )),
                )
                .col(ColumnDef::new(Appointments::Notes).text())
                .col(created_at)
                .col(updated_at)
                .foreign_key(
                    ForeignKey::create()
                        .name("appointments_patient_fk")
                        .from(Appointments::Table, Appointments::PatientId)
                        .to(Patients::Table, Patients::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("appointments_doctor_fk")
                        .from(Appointments::Table, Appointments::DoctorId)
                        .to(Users::Table, Users::Id),
                )
                .to_owned(),
        )
        .await?;

    Ok(())
}

#[derive(Iden)]
enum Appointments {
    Table,
    Id,
    PatientId,
    DoctorId,
    AppointmentDate,
    AppointmentTime,
    Reason,
    Status,
    Notes,
    CreatedAt,
    UpdatedAt,
}
