//! Simulated camera hardware.
//!
//! Registers `<sensor_name>/data` in a [`StateInterfaceTable`] and writes a
//! scrolling diagonal test pattern into it on every `tick()`. Used by the
//! binary and by tests to exercise the broadcaster without a real camera.

use crate::broadcaster::BroadcasterParams;
use broadcaster_common::consts::CAMERA_DATA_INTERFACE;
use broadcaster_common::hal::{HalError, StateInterface, StateInterfaceTable, ValueBuffer};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Software camera producing a test pattern.
pub struct SimulatedCamera {
    frame: ValueBuffer,
    row_bytes: usize,
    rows: usize,
    frame_count: u64,
}

impl SimulatedCamera {
    /// Create the camera described by `params` and register its interface.
    ///
    /// # Errors
    /// `HalError::DuplicateInterface` if the table already has the interface.
    pub fn register(
        table: &mut StateInterfaceTable,
        params: &BroadcasterParams,
    ) -> Result<Self, HalError> {
        let rows = params.height as usize;
        let row_bytes = params.step as usize;
        let frame: ValueBuffer = Arc::new(Mutex::new(vec![0; rows * row_bytes]));
        table.register(StateInterface::new(
            &params.sensor_name,
            CAMERA_DATA_INTERFACE,
            Arc::clone(&frame),
        ))?;

        info!(
            "Simulated camera '{}' registered ({}x{}, {} bytes/row)",
            params.sensor_name, params.width, params.height, params.step
        );
        Ok(Self {
            frame,
            row_bytes,
            rows,
            frame_count: 0,
        })
    }

    /// Produce the next frame.
    pub fn tick(&mut self) {
        self.frame_count = self.frame_count.wrapping_add(1);
        let shift = self.frame_count as usize;
        let mut frame = self.frame.lock();
        for (y, row) in frame.chunks_exact_mut(self.row_bytes.max(1)).enumerate() {
            for (x, px) in row.iter_mut().enumerate() {
                *px = (x + y + shift) as u8;
            }
        }
    }

    /// Frames produced so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frame size in bytes.
    pub fn frame_len(&self) -> usize {
        self.rows * self.row_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcaster_common::hal::StateInterfaceProvider;

    fn params() -> BroadcasterParams {
        BroadcasterParams {
            sensor_name: "sim_cam".into(),
            frame_id: "sim_frame".into(),
            height: 2,
            width: 2,
            step: 4,
            ..Default::default()
        }
    }

    #[test]
    fn registers_data_interface() {
        let mut table = StateInterfaceTable::new();
        let cam = SimulatedCamera::register(&mut table, &params()).unwrap();
        assert_eq!(cam.frame_len(), 8);
        assert!(table.loan_state_interface("sim_cam/data").is_some());
        assert!(SimulatedCamera::register(&mut table, &params()).is_err());
    }

    #[test]
    fn tick_writes_shifting_pattern() {
        let mut table = StateInterfaceTable::new();
        let mut cam = SimulatedCamera::register(&mut table, &params()).unwrap();
        let loan = table.loan_state_interface("sim_cam/data").unwrap();

        cam.tick();
        let mut out = [0u8; 8];
        loan.try_read_into(&mut out);
        assert_eq!(out, [1, 2, 3, 4, 2, 3, 4, 5]);

        cam.tick();
        loan.try_read_into(&mut out);
        assert_eq!(out[0], 2);
        assert_eq!(cam.frame_count(), 2);
    }
}
