use sea_orm_migration::prelude::*;

use crate::m20240901_000001_people_and_classes::{Class, Student, Subject, Teacher};

#[derive(DeriveMigrationName)]
pub struct Migration;

fn id_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Lesson::Table)
                    .if_not_exists()
                    .col(&mut id_column(Lesson::Id))
                    .col(ColumnDef::new(Lesson::Name).string().not_null())
                    .col(ColumnDef::new(Lesson::Day).string_len(16).not_null())
                    .col(ColumnDef::new(Lesson::StartTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Lesson::EndTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Lesson::SubjectId).integer().not_null())
                    .col(ColumnDef::new(Lesson::ClassId).integer().not_null())
                    .col(ColumnDef::new(Lesson::TeacherId).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Lesson::Table, Lesson::SubjectId)
                            .to(Subject::Table, Subject::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Lesson::Table, Lesson::ClassId)
                            .to(Class::Table, Class::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Lesson::Table, Lesson::TeacherId)
                            .to(Teacher::Table, Teacher::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Exam::Table)
                    .if_not_exists()
                    .col(&mut id_column(Exam::Id))
                    .col(ColumnDef::new(Exam::Title).string().not_null())
                    .col(ColumnDef::new(Exam::StartTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Exam::EndTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Exam::LessonId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Exam::Table, Exam::LessonId)
                            .to(Lesson::Table, Lesson::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Assignment::Table)
                    .if_not_exists()
                    .col(&mut id_column(Assignment::Id))
                    .col(ColumnDef::new(Assignment::Title).string().not_null())
                    .col(ColumnDef::new(Assignment::StartDate).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Assignment::DueDate).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Assignment::LessonId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Assignment::Table, Assignment::LessonId)
                            .to(Lesson::Table, Lesson::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExamResult::Table)
                    .if_not_exists()
                    .col(&mut id_column(ExamResult::Id))
                    .col(ColumnDef::new(ExamResult::Score).integer().not_null())
                    .col(ColumnDef::new(ExamResult::ExamId).integer().null())
                    .col(ColumnDef::new(ExamResult::AssignmentId).integer().null())
                    .col(ColumnDef::new(ExamResult::StudentId).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ExamResult::Table, ExamResult::ExamId)
                            .to(Exam::Table, Exam::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ExamResult::Table, ExamResult::AssignmentId)
                            .to(Assignment::Table, Assignment::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ExamResult::Table, ExamResult::StudentId)
                            .to(Student::Table, Student::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Event::Table)
                    .if_not_exists()
                    .col(&mut id_column(Event::Id))
                    .col(ColumnDef::new(Event::Title).string().not_null())
                    .col(ColumnDef::new(Event::Description).text().not_null())
                    .col(ColumnDef::new(Event::StartTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Event::EndTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Event::ClassId).integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Event::Table, Event::ClassId)
                            .to(Class::Table, Class::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Announcement::Table)
                    .if_not_exists()
                    .col(&mut id_column(Announcement::Id))
                    .col(ColumnDef::new(Announcement::Title).string().not_null())
                    .col(ColumnDef::new(Announcement::Description).text().not_null())
                    .col(ColumnDef::new(Announcement::Date).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Announcement::ClassId).integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Announcement::Table, Announcement::ClassId)
                            .to(Class::Table, Class::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Attendance::Table)
                    .if_not_exists()
                    .col(&mut id_column(Attendance::Id))
                    .col(ColumnDef::new(Attendance::Date).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Attendance::Present).boolean().not_null())
                    .col(ColumnDef::new(Attendance::StudentId).string().not_null())
                    .col(ColumnDef::new(Attendance::LessonId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Attendance::Table, Attendance::StudentId)
                            .to(Student::Table, Student::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Attendance::Table, Attendance::LessonId)
                            .to(Lesson::Table, Lesson::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_lesson_teacher")
                    .table(Lesson::Table)
                    .col(Lesson::TeacherId)
                    .to_owned(),
            )
            .await?;

        // Bulk replace deletes by (lesson, day).
        manager
            .create_index(
                Index::create()
                    .name("idx_attendance_lesson_date")
                    .table(Attendance::Table)
                    .col(Attendance::LessonId)
                    .col(Attendance::Date)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attendance::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Announcement::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Event::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExamResult::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Assignment::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Exam::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Lesson::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Lesson {
    Table,
    Id,
    Name,
    Day,
    StartTime,
    EndTime,
    SubjectId,
    ClassId,
    TeacherId,
}

#[derive(DeriveIden)]
enum Exam {
    Table,
    Id,
    Title,
    StartTime,
    EndTime,
    LessonId,
}

#[derive(DeriveIden)]
enum Assignment {
    Table,
    Id,
    Title,
    StartDate,
    DueDate,
    LessonId,
}

#[derive(DeriveIden)]
enum ExamResult {
    #[sea_orm(iden = "result")]
    Table,
    Id,
    Score,
    ExamId,
    AssignmentId,
    StudentId,
}

#[derive(DeriveIden)]
enum Event {
    Table,
    Id,
    Title,
    Description,
    StartTime,
    EndTime,
    ClassId,
}

#[derive(DeriveIden)]
enum Announcement {
    Table,
    Id,
    Title,
    Description,
    Date,
    ClassId,
}

#[derive(DeriveIden)]
enum Attendance {
    Table,
    Id,
    Date,
    Present,
    StudentId,
    LessonId,
}
