//! Camera semantic component.
//!
//! Maps the HAL state interfaces of one camera (`<name>/data`) onto the
//! dynamic part of an [`Image`]. The component is created unresolved at
//! configure time, bound at activation and released at deactivation.

use broadcaster_common::consts::{CAMERA_DATA_INTERFACE, MAX_SENSOR_INTERFACES, full_interface_name};
use broadcaster_common::hal::{LoanedStateInterface, StateInterfaceProvider};
use broadcaster_common::msgs::Image;
use tracing::{debug, warn};

/// Outcome of refreshing a message from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorRead {
    /// Frame copied; number of bytes taken from the sensor.
    Fresh(usize),
    /// Hardware side was writing the frame; message left untouched.
    Busy,
    /// Interfaces are not bound; message left untouched.
    Unbound,
}

/// Camera sensor bound to HAL state interfaces.
#[derive(Debug)]
pub struct CameraSensor {
    name: String,
    interface_names: heapless::Vec<String, MAX_SENSOR_INTERFACES>,
    loaned: heapless::Vec<LoanedStateInterface, MAX_SENSOR_INTERFACES>,
}

impl CameraSensor {
    /// Describe the camera `name`. Nothing is resolved yet.
    pub fn new(name: &str) -> Self {
        let mut interface_names = heapless::Vec::new();
        // Capacity is at least one.
        let _ = interface_names.push(full_interface_name(name, CAMERA_DATA_INTERFACE));
        Self {
            name: name.to_string(),
            interface_names,
            loaned: heapless::Vec::new(),
        }
    }

    /// Sensor name (interface prefix).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full names of the state interfaces this camera needs.
    pub fn get_state_interface_names(&self) -> &[String] {
        &self.interface_names
    }

    /// Resolve every declared interface against `provider`.
    ///
    /// Missing interfaces are not an error here; the camera simply stays
    /// unbound. Loans beyond [`MAX_SENSOR_INTERFACES`] are dropped with a
    /// warning. Returns the number of interfaces bound.
    pub fn assign_loaned_state_interfaces(
        &mut self,
        provider: &dyn StateInterfaceProvider,
    ) -> usize {
        self.loaned.clear();
        for name in &self.interface_names {
            match provider.loan_state_interface(name) {
                Some(loan) => {
                    if self.loaned.push(loan).is_err() {
                        warn!(
                            "State interface capacity {} exceeded; {} not bound",
                            MAX_SENSOR_INTERFACES, name
                        );
                    }
                }
                None => debug!("State interface {} not available", name),
            }
        }
        self.loaned.len()
    }

    /// Drop all loans.
    pub fn release_interfaces(&mut self) {
        self.loaned.clear();
    }

    /// True if every declared interface is bound.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.loaned.len() == self.interface_names.len()
    }

    /// Copy the current frame into `msg.data`.
    ///
    /// `msg.data` must already be sized by the caller; it is never grown,
    /// so this does not allocate. Excess sensor bytes are truncated and a
    /// short frame is zero-filled.
    #[inline]
    pub fn get_values_as_message(&self, msg: &mut Image) -> SensorRead {
        if !self.is_bound() {
            return SensorRead::Unbound;
        }
        match self.loaned[0].try_read_into(&mut msg.data) {
            Some(n) => SensorRead::Fresh(n),
            None => SensorRead::Busy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcaster_common::hal::{StateInterface, StateInterfaceTable, ValueBuffer};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn table_with(name: &str, bytes: &[u8]) -> (StateInterfaceTable, ValueBuffer) {
        let buffer: ValueBuffer = Arc::new(Mutex::new(bytes.to_vec()));
        let mut table = StateInterfaceTable::new();
        table
            .register(StateInterface::new(name, "data", Arc::clone(&buffer)))
            .unwrap();
        (table, buffer)
    }

    fn image_with_len(len: usize) -> Image {
        Image {
            data: vec![0xAA; len],
            ..Default::default()
        }
    }

    #[test]
    fn declares_data_interface() {
        let sensor = CameraSensor::new("camera_sensor");
        assert_eq!(sensor.name(), "camera_sensor");
        assert_eq!(sensor.get_state_interface_names(), ["camera_sensor/data".to_string()]);
        assert!(!sensor.is_bound());
    }

    #[test]
    fn assign_and_release() {
        let (table, _) = table_with("cam", &[1, 2, 3]);
        let mut sensor = CameraSensor::new("cam");

        assert_eq!(sensor.assign_loaned_state_interfaces(&table), 1);
        assert!(sensor.is_bound());

        sensor.release_interfaces();
        assert!(!sensor.is_bound());
        assert_eq!(sensor.get_state_interface_names().len(), 1);
    }

    #[test]
    fn missing_interface_leaves_sensor_unbound() {
        let (table, _) = table_with("other", &[1]);
        let mut sensor = CameraSensor::new("cam");
        assert_eq!(sensor.assign_loaned_state_interfaces(&table), 0);

        let mut msg = image_with_len(2);
        assert_eq!(sensor.get_values_as_message(&mut msg), SensorRead::Unbound);
        assert_eq!(msg.data, vec![0xAA, 0xAA]);
    }

    #[test]
    fn binds_up_to_interface_capacity() {
        let mut table = StateInterfaceTable::new();
        let mut sensor = CameraSensor::new("cam0");
        sensor.interface_names.clear();
        for i in 0..MAX_SENSOR_INTERFACES {
            let prefix = format!("cam{i}");
            table
                .register(StateInterface::new(&prefix, "data", Arc::new(Mutex::new(vec![0]))))
                .unwrap();
            sensor
                .interface_names
                .push(full_interface_name(&prefix, CAMERA_DATA_INTERFACE))
                .unwrap();
        }

        assert_eq!(
            sensor.assign_loaned_state_interfaces(&table),
            MAX_SENSOR_INTERFACES
        );
        assert!(sensor.is_bound());
    }

    #[test]
    fn copies_frame_without_resizing() {
        let (table, _) = table_with("cam", &[1, 2, 3]);
        let mut sensor = CameraSensor::new("cam");
        sensor.assign_loaned_state_interfaces(&table);

        let mut msg = image_with_len(5);
        let capacity = msg.data.capacity();
        assert_eq!(sensor.get_values_as_message(&mut msg), SensorRead::Fresh(3));
        assert_eq!(msg.data, vec![1, 2, 3, 0, 0]);
        assert_eq!(msg.data.capacity(), capacity);
    }

    #[test]
    fn busy_hardware_keeps_previous_bytes() {
        let (table, buffer) = table_with("cam", &[9, 9]);
        let mut sensor = CameraSensor::new("cam");
        sensor.assign_loaned_state_interfaces(&table);

        let mut msg = image_with_len(2);
        let _writer = buffer.lock();
        assert_eq!(sensor.get_values_as_message(&mut msg), SensorRead::Busy);
        assert_eq!(msg.data, vec![0xAA, 0xAA]);
    }
}
