pub mod booking;
pub mod booking_file;
pub mod cart_item;
pub mod site;
