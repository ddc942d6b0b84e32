use sea_orm_migration::{prelude::*, sea_orm::DatabaseBackend};

#[derive(DeriveIden)]
enum Employees {
    Table,
    Id,
    Name,
    Email,
    Department,
    Salary,
    HireDate,
    IsActive,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut salary = ColumnDef::new(Employees::Salary);
        match manager.get_database_backend() {
            // SQLite has no fixed-point type; REAL affinity keeps values readable as floats.
            DatabaseBackend::Sqlite => salary.double(),
            _ => salary.decimal_len(10, 2),
        };
        salary.not_null();

        manager
            .create_table(
                Table::create()
                    .table(Employees::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Employees::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Employees::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Employees::Email).string_len(150).not_null())
                    .col(
                        ColumnDef::new(Employees::Department)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(&mut salary)
                    .col(
                        ColumnDef::new(Employees::HireDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Employees::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Employees::Table).if_exists().to_owned())
            .await
    }
}
