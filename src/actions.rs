//! Messages exchanged between the controller and the background worker
use crate::api::{Coordinate, QueryError, SearchRequest, Station};
use crate::geolocation::{GeolocationError, PositionOptions};

// Requests from the controller to the worker
#[derive(Debug, Clone)]
pub enum Request {
    Locate { search_id: u64, options: PositionOptions },
    Search { search_id: u64, request: SearchRequest, limit: u32 },
}

// Responses from the worker back to the controller
#[derive(Debug)]
pub enum Response {
    Located {
        search_id: u64,
        result: Result<Coordinate, GeolocationError>,
    },
    SearchCompleted {
        search_id: u64,
        request: SearchRequest,
        result: Result<Vec<Station>, QueryError>,
    },
}
