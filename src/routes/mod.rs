pub mod fit_routes;
