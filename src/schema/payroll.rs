use sea_orm_migration::prelude::*;

use super::{employees::Employees, text_in, timestamp_columns};

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.has_table("payroll").await? {
        return Ok(());
    }

    let [created_at, updated_at] = timestamp_columns(Payroll::CreatedAt, Payroll::UpdatedAt);
    manager
        .create_table(
            Table::create()
                .table(Payroll::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Payroll::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Payroll::EmployeeId).integer().not_null())
                .col(
                    ColumnDef::new(Payroll::Month)
                        .integer()
                        .not_null()
                        .check(Expr::col(Payroll::Month).between(1, 12)),
                )
                .col(ColumnDef::new(Payroll::Year).integer().not_null())
                .col(ColumnDef::new(Payroll::BaseSalary).double().not_null())
                .col(ColumnDef::new(Payroll::Allowances).double().not_null().default(0.0))
                .col(ColumnDef::new(Payroll::Deductions).double().not_null().default(0.0))
                .col(ColumnDef::new(Payroll::Bonus).double().not_null().default(0.0))
                .col(ColumnDef::new(Payroll::NetSalary).double().not_null())
                .col(
                    ColumnDef::new(Payroll::Status)
                        .string_len(50)
                        .not_null()
                        .default("pending")
                        .check(text_in(Payroll::Status, &["pending", "paid", "cancelled"])),
                )
                .col(ColumnDef::new(Payroll::PaymentDate).date())
                .col(created_at)
                .col(updated_at)
                .foreign_key(
                    ForeignKey::create()
                        .name("payroll_employee_fk")
                        .from(Payroll::Table, Payroll::EmployeeId)
                        .to(Employees::Table, Employees::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name("payroll_employee_period_unique")
                .table(Payroll::Table)
                .col(Payroll::EmployeeId)
                .col(Payroll::Month)
                .col(Payroll::Year)
                .unique()
                .to_owned(),
        )
        .await?;

    Ok(())
}

#[derive(Iden)]
enum Payroll {
    Table,
    Id,
    EmployeeId,
    Month,
    Year,
    BaseSalary,
    Allowances,
    Deductions,
    Bonus,
    NetSalary,
    Status,
    PaymentDate,
    CreatedAt,
    UpdatedAt,
}
