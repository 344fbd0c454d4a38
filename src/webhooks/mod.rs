pub mod orion;
