use sea_orm_migration::prelude::*;

use super::{text_in, timestamp_columns};

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.has_table("users").await? {
        return Ok(());
    }

    let [created_at, updated_at] = timestamp_columns(Users::CreatedAt, Users::UpdatedAt);
    manager
        .create_table(
            Table::create()
                .table(Users::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Users::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Users::Email).string_len(255))
                .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                .col(ColumnDef::new(Users::FirstName).string_len(100).not_null())
                .col(ColumnDef::new(Users::LastName).string_len(100).not_null())
                .col(
                    ColumnDef::new(Users::Role)
                        .string_len(50)
                        .not_null()
                        .check(text_in(
                            Users::Role,
                            &["patient", "doctor", "nurse", "staff", "admin"],
                        )),
                )
                .col(ColumnDef::new(Users::DoctorId).string_len(50))
                .col(ColumnDef::new(Users::ProfilePicture).text())
                .col(
                    ColumnDef::new(Users::MustChangePassword)
                        .boolean()
                        .not_null()
                        .default(false),
                )
                .col(created_at)
                .col(updated_at)
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name("users_email_unique")
                .table(Users::Table)
                .col(Users::Email)
                .unique()
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name("users_doctor_id_unique")
                .table(Users::Table)
                .col(Users::DoctorId)
                .unique()
                .to_owned(),
        )
        .await?;

    Ok(())
}

#[derive(Iden)]
pub(super) enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    Role,
    DoctorId,
    ProfilePicture,
    MustChangePassword,
    CreatedAt,
    UpdatedAt,
}
