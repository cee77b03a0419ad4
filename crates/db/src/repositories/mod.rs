mod booking_repo;

pub use booking_repo::BookingRepo;
