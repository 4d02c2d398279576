pub mod inbox_router;
pub mod outbox_dispatcher;
pub mod settlement_worker;
pub mod spot_price_ingester;
