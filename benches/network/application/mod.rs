pub mod m2x;
