pub mod clock;
pub mod delay;
pub mod gpio;
pub mod register;
pub mod register_file;
