use sea_orm_migration::prelude::*;

use super::{text_in, timestamp_columns, users::Users};

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.has_table("notices").await? {
        return Ok(());
    }

    let [created_at, updated_at] = timestamp_columns(Notices::CreatedAt, Notices::UpdatedAt);
    manager
        .create_table(
            Table::create()
                .table(Notices::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Notices::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Notices::Title).string_len(255).not_null())
                .col(ColumnDef::new(Notices::Content).text().not_null())
                .col(
                    ColumnDef::new(Notices::Priority)
                        .string_len(50)
                        .not_null()
                        .default("normal")
                        .check(text_in(
                            Notices::Priority,
                            &["low", "normal", "high", "urgent"],
                        )),
                )
                .col(
                    ColumnDef::new(Notices::TargetAudience)
                        .string_len(50)
                        .not_null()
                        .default("all")
                        .check(text_in(
                            Notices::TargetAudience,
                            &["all", "doctors", "nurses", "patients", "staff"],
                        )),
                )
                .col(ColumnDef::new(Notices::CreatedBy).integer())
                .col(created_at)
                .col(updated_at)
                .foreign_key(
                    ForeignKey::create()
                        .name("notices_created_by_fk")
                        .from(Notices::Table, Notices::CreatedBy)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .to_owned(),
        )
        .await?;

    Ok(())
}

#[derive(Iden)]
enum Notices {
    Table,
    Id,
    Title,
    Content,
    Priority,
    TargetAudience,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
