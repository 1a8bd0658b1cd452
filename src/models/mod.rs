pub mod blip;
