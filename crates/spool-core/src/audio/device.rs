//! Output device lookup

use cpal::traits::{DeviceTrait, HostTrait};

use super::error::{AudioError, AudioResult};

/// Names of every output device on the default host
pub fn output_device_names() -> AudioResult<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::ConfigQuery(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Default output device of the default host
pub fn default_output_device() -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    host.default_output_device().ok_or_else(|| {
        AudioError::NoDefaultDevice(format!("{:?} host has no default output", host.id()))
    })
}

/// Output device whose name matches `name` exactly
pub fn find_output_device(name: &str) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    let mut devices = host
        .output_devices()
        .map_err(|e| AudioError::ConfigQuery(e.to_string()))?
        .peekable();

    if devices.peek().is_none() {
        return Err(AudioError::NoDevices);
    }

    devices
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}
