pub mod flight_recorder;
pub mod recording;

pub use flight_recorder::{
    FlightRecorder, FlightRecorderSpec, FlightRecorderStatus,
};
pub use recording::{
    Recording, RecordingSpec, RecordingState, RecordingStatus,
};
