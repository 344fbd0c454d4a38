pub mod urv_bot;
