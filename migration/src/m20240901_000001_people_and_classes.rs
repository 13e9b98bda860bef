use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Admin::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Admin::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Admin::Username).string().not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Grade::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Grade::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Grade::Level).integer().not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Subject::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subject::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Subject::Name).string().not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Teacher::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Teacher::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Teacher::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Teacher::Name).string().not_null())
                    .col(ColumnDef::new(Teacher::Surname).string().not_null())
                    .col(ColumnDef::new(Teacher::Email).string().null().unique_key())
                    .col(ColumnDef::new(Teacher::Phone).string().null().unique_key())
                    .col(ColumnDef::new(Teacher::Address).string().not_null())
                    .col(ColumnDef::new(Teacher::Img).string().null())
                    .col(ColumnDef::new(Teacher::BloodType).string().not_null())
                    .col(ColumnDef::new(Teacher::Sex).string_len(16).not_null())
                    .col(ColumnDef::new(Teacher::Birthday).date().not_null())
                    .col(
                        ColumnDef::new(Teacher::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TeacherSubject::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TeacherSubject::TeacherId).string().not_null())
                    .col(ColumnDef::new(TeacherSubject::SubjectId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(TeacherSubject::TeacherId)
                            .col(TeacherSubject::SubjectId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TeacherSubject::Table, TeacherSubject::TeacherId)
                            .to(Teacher::Table, Teacher::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TeacherSubject::Table, TeacherSubject::SubjectId)
                            .to(Subject::Table, Subject::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Parent::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Parent::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Parent::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Parent::Name).string().not_null())
                    .col(ColumnDef::new(Parent::Surname).string().not_null())
                    .col(ColumnDef::new(Parent::Email).string().null().unique_key())
                    .col(ColumnDef::new(Parent::Phone).string().not_null().unique_key())
                    .col(ColumnDef::new(Parent::Address).string().not_null())
                    .col(
                        ColumnDef::new(Parent::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Class::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Class::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Class::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Class::Capacity).integer().not_null())
                    .col(ColumnDef::new(Class::SupervisorId).string().null())
                    .col(ColumnDef::new(Class::GradeId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Class::Table, Class::SupervisorId)
                            .to(Teacher::Table, Teacher::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Class::Table, Class::GradeId)
                            .to(Grade::Table, Grade::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Student::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Student::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Student::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Student::Name).string().not_null())
                    .col(ColumnDef::new(Student::Surname).string().not_null())
                    .col(ColumnDef::new(Student::Email).string().null().unique_key())
                    .col(ColumnDef::new(Student::Phone).string().null().unique_key())
                    .col(ColumnDef::new(Student::Address).string().not_null())
                    .col(ColumnDef::new(Student::Img).string().null())
                    .col(ColumnDef::new(Student::BloodType).string().not_null())
                    .col(ColumnDef::new(Student::Sex).string_len(16).not_null())
                    .col(ColumnDef::new(Student::Birthday).date().not_null())
                    .col(ColumnDef::new(Student::ParentId).string().not_null())
                    .col(ColumnDef::new(Student::ClassId).integer().not_null())
                    .col(ColumnDef::new(Student::GradeId).integer().not_null())
                    .col(
                        ColumnDef::new(Student::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Student::Table, Student::ParentId)
                            .to(Parent::Table, Parent::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Student::Table, Student::ClassId)
                            .to(Class::Table, Class::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Student::Table, Student::GradeId)
                            .to(Grade::Table, Grade::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_student_class")
                    .table(Student::Table)
                    .col(Student::ClassId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Student::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Class::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Parent::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TeacherSubject::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teacher::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subject::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Grade::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Admin::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Admin {
    Table,
    Id,
    Username,
}

#[derive(DeriveIden)]
enum Grade {
    Table,
    Id,
    Level,
}

#[derive(DeriveIden)]
pub(crate) enum Subject {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
pub(crate) enum Teacher {
    Table,
    Id,
    Username,
    Name,
    Surname,
    Email,
    Phone,
    Address,
    Img,
    BloodType,
    Sex,
    Birthday,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TeacherSubject {
    Table,
    TeacherId,
    SubjectId,
}

#[derive(DeriveIden)]
enum Parent {
    Table,
    Id,
    Username,
    Name,
    Surname,
    Email,
    Phone,
    Address,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Class {
    Table,
    Id,
    Name,
    Capacity,
    SupervisorId,
    GradeId,
}

#[derive(DeriveIden)]
pub(crate) enum Student {
    Table,
    Id,
    Username,
    Name,
    Surname,
    Email,
    Phone,
    Address,
    Img,
    BloodType,
    Sex,
    Birthday,
    ParentId,
    ClassId,
    GradeId,
    CreatedAt,
}
