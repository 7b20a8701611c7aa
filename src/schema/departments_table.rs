use sea_orm_migration::prelude::*;

use super::users::Users;

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.has_table("departments").await? {
        return Ok(());
    }

    manager
        .create_table(
            Table::create()
                .table(Departments::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Departments::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Departments::Name).string_len(100).not_null())
                .col(ColumnDef::new(Departments::Description).text())
                .col(ColumnDef::new(Departments::HeadDoctorId).integer())
                .col(
                    ColumnDef::new(Departments::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp()),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("departments_head_doctor_fk")
                        .from(Departments::Table, Departments::HeadDoctorId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name("departments_name_unique")
                .table(Departments::Table)
                .col(Departments::Name)
                .unique()
                .to_owned(),
        )
        .await?;

    Ok(())
}

#[derive(Iden)]
pub(super) enum Departments {
    Table,
    Id,
    Name,
    Description,
    HeadDoctorId,
    CreatedAt,
}
