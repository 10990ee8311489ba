use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========================================
        // VR_SESSIONS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(VrSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VrSessions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VrSessions::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VrSessions::EndedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(VrSessions::DurationSeconds).big_integer().null())
                    .col(
                        ColumnDef::new(VrSessions::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(VrSessions::CustomerId).string().null())
                    .col(ColumnDef::new(VrSessions::PropertyId).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_vr_sessions_status")
                    .table(VrSessions::Table)
                    .col(VrSessions::Status)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // POI_VISITS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(PoiVisits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PoiVisits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PoiVisits::PoiName).string().not_null())
                    .col(ColumnDef::new(PoiVisits::ParentZone).string().not_null())
                    .col(ColumnDef::new(PoiVisits::DurationString).string().not_null())
                    .col(
                        ColumnDef::new(PoiVisits::DurationSeconds)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PoiVisits::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // VIEW_EVENTS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(ViewEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ViewEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ViewEvents::ViewName).string().not_null())
                    .col(ColumnDef::new(ViewEvents::DurationString).string().not_null())
                    .col(
                        ColumnDef::new(ViewEvents::DurationSeconds)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ViewEvents::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // SIMPLE_EVENTS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(SimpleEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SimpleEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SimpleEvents::EventType).string().not_null())
                    .col(ColumnDef::new(SimpleEvents::SessionId).string().null())
                    .col(
                        ColumnDef::new(SimpleEvents::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(SimpleEvents::Data).json_binary().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_simple_events_event_type")
                    .table(SimpleEvents::Table)
                    .col(SimpleEvents::EventType)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // TRACKING_EVENTS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(TrackingEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackingEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TrackingEvents::SessionId).string().not_null())
                    .col(ColumnDef::new(TrackingEvents::EventType).string().not_null())
                    .col(
                        ColumnDef::new(TrackingEvents::Timestamp)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(TrackingEvents::ZoneName).string().null())
                    .col(ColumnDef::new(TrackingEvents::ObjectName).string().null())
                    .col(ColumnDef::new(TrackingEvents::GazeTarget).string().null())
                    .col(ColumnDef::new(TrackingEvents::InteractionType).string().null())
                    .col(ColumnDef::new(TrackingEvents::DwellTimeMs).big_integer().null())
                    .col(ColumnDef::new(TrackingEvents::PositionX).double().null())
                    .col(ColumnDef::new(TrackingEvents::PositionY).double().null())
                    .col(ColumnDef::new(TrackingEvents::PositionZ).double().null())
                    .col(ColumnDef::new(TrackingEvents::RotationPitch).double().null())
                    .col(ColumnDef::new(TrackingEvents::RotationYaw).double().null())
                    .col(ColumnDef::new(TrackingEvents::RotationRoll).double().null())
                    .col(ColumnDef::new(TrackingEvents::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(TrackingEvents::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracking_events_session_id")
                    .table(TrackingEvents::Table)
                    .col(TrackingEvents::SessionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracking_events_zone_name")
                    .table(TrackingEvents::Table)
                    .col(TrackingEvents::ZoneName)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TrackingEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SimpleEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ViewEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PoiVisits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VrSessions::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum VrSessions {
    Table,
    Id,
    StartedAt,
    EndedAt,
    DurationSeconds,
    Status,
    CustomerId,
    PropertyId,
}

#[derive(DeriveIden)]
enum PoiVisits {
    Table,
    Id,
    PoiName,
    ParentZone,
    DurationString,
    DurationSeconds,
    ReceivedAt,
}

#[derive(DeriveIden)]
enum ViewEvents {
    Table,
    Id,
    ViewName,
    DurationString,
    DurationSeconds,
    ReceivedAt,
}

#[derive(DeriveIden)]
enum SimpleEvents {
    Table,
    Id,
    EventType,
    SessionId,
    ReceivedAt,
    Data,
}

#[derive(DeriveIden)]
enum TrackingEvents {
    Table,
    Id,
    SessionId,
    EventType,
    Timestamp,
    ZoneName,
    ObjectName,
    GazeTarget,
    InteractionType,
    DwellTimeMs,
    PositionX,
    PositionY,
    PositionZ,
    RotationPitch,
    RotationYaw,
    RotationRoll,
    Metadata,
    ReceivedAt,
}
