pub mod ledger_settings;
pub mod lot;
pub mod movement;
pub mod product;
pub mod product_input;
pub mod production_order;
pub mod production_order_line;
pub mod purchase_order;
pub mod purchase_order_item;
pub mod transaction_user;
pub mod warehouse_transaction;
