pub mod fit_controller;
