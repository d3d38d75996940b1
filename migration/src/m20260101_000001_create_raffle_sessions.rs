use sea_orm_migration::prelude::*;

/// Raffle Sessions (每个抽奖场次一行，整条记录整体覆盖写入)
#[derive(DeriveIden)]
enum RaffleSessions {
    Table,
    SessionId,
    State,
    Data,
    CreatedAt,
    LastActiveAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// data 列保存完整的场次快照 (场次信息 + 批次表 + 票据表)
/// state / last_active_at 冗余存储，便于运维查询与空闲清理
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RaffleSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RaffleSessions::SessionId)
                            .string_len(16)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RaffleSessions::State).string_len(16).not_null())
                    .col(ColumnDef::new(RaffleSessions::Data).json().not_null())
                    .col(
                        ColumnDef::new(RaffleSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RaffleSessions::LastActiveAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raffle_sessions_last_active_at")
                    .table(RaffleSessions::Table)
                    .col(RaffleSessions::LastActiveAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RaffleSessions::Table).to_owned())
            .await
    }
}
