//! Device model: one device's descriptor tree and its derived views
//!
//! The raw configuration blob is flattened once at registration:
//! configuration descriptor, then for every interface (across all
//! alternate settings, in declared order) the interface descriptor, its
//! optional class-specific block, then each endpoint descriptor followed
//! by its optional class-specific block. GET_DESCRIPTOR(CONFIGURATION)
//! serves prefixes of this blob, so hosts reading it in chunks always see
//! consistent bytes.

use crate::descriptors::{Bos, Configuration, DeviceDescriptor, DeviceQualifier, Interface};
use crate::error::{DescriptorError, Result};
use crate::strings::StringTable;

#[derive(Debug, Clone)]
pub struct DeviceModel {
    device: DeviceDescriptor,
    configurations: Vec<Configuration>,
    strings: StringTable,
    qualifier: Option<DeviceQualifier>,
    bos: Option<Bos>,
    device_bytes: Vec<u8>,
    raw_configurations: Vec<Vec<u8>>,
}

impl DeviceModel {
    /// Build a model, flattening every configuration up front. Encode
    /// failures surface here so serving descriptors later cannot fail
    /// for layout reasons.
    pub fn new(
        device: DeviceDescriptor,
        configurations: Vec<Configuration>,
        strings: StringTable,
    ) -> Result<Self> {
        let device_bytes = device.encode()?;
        let raw_configurations = configurations
            .iter()
            .map(flatten_configuration)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            device,
            configurations,
            strings,
            qualifier: None,
            bos: None,
            device_bytes,
            raw_configurations,
        })
    }

    pub fn with_qualifier(mut self, qualifier: DeviceQualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    pub fn with_bos(mut self, bos: Bos) -> Self {
        self.bos = Some(bos);
        self
    }

    pub fn device_descriptor(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// First interface of the first configuration, the one summarized in
    /// the device-list reply.
    pub fn first_interface(&self) -> Option<&Interface> {
        self.configurations.first()?.interfaces.first()
    }

    /// Count of distinct interface numbers in the given configuration.
    pub fn num_interfaces(&self, config_index: u8) -> u8 {
        self.configurations
            .get(config_index as usize)
            .map(distinct_interface_count)
            .unwrap_or(0)
    }

    /// Does any configuration declare this interface number?
    pub fn has_interface(&self, number: u8) -> bool {
        self.configurations
            .iter()
            .flat_map(|config| config.interfaces.iter())
            .any(|iface| iface.number == number)
    }

    /// The 18-byte device descriptor.
    pub fn device_descriptor_bytes(&self) -> &[u8] {
        &self.device_bytes
    }

    /// The flattened configuration blob for `index`.
    pub fn raw_configuration(&self, index: u8) -> Result<&[u8]> {
        self.raw_configurations
            .get(index as usize)
            .map(Vec::as_slice)
            .ok_or(DescriptorError::ConfigurationIndex { index })
    }

    /// String descriptor for `index`. The table is single-language; the
    /// requested language id does not select among translations.
    pub fn string_bytes(&self, index: u8, _language: u16) -> Result<Vec<u8>> {
        self.strings.descriptor(index)
    }

    pub fn device_qualifier_bytes(&self) -> Result<Vec<u8>> {
        match &self.qualifier {
            Some(qualifier) => Ok(qualifier.encode()?),
            None => Err(DescriptorError::UnsupportedType {
                descriptor_type: 0x06,
            }),
        }
    }

    pub fn bos_bytes(&self) -> Result<Vec<u8>> {
        match &self.bos {
            Some(bos) => Ok(bos.encode()?),
            None => Err(DescriptorError::UnsupportedType {
                descriptor_type: 0x0F,
            }),
        }
    }
}

fn flatten_configuration(config: &Configuration) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    for iface in &config.interfaces {
        body.extend_from_slice(&iface.encode()?);
        if let Some(blob) = &iface.class_descriptor {
            body.extend_from_slice(blob);
        }
        for endpoint in &iface.endpoints {
            body.extend_from_slice(&endpoint.encode()?);
            if let Some(blob) = &endpoint.class_descriptor {
                body.extend_from_slice(blob);
            }
        }
    }

    let total_length = (crate::descriptors::CONFIGURATION_DESCRIPTOR.size() + body.len()) as u16;
    let mut out = config.encode_head(total_length, distinct_interface_count(config))?;
    out.extend_from_slice(&body);
    Ok(out)
}

fn distinct_interface_count(config: &Configuration) -> u8 {
    let mut numbers: Vec<u8> = config.interfaces.iter().map(|iface| iface.number).collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers.len() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::Endpoint;

    fn two_alt_model() -> DeviceModel {
        let device = DeviceDescriptor {
            vendor_id: 0x04e8,
            product_id: 0x61f6,
            num_configurations: 1,
            ..Default::default()
        };
        let config = Configuration {
            value: 1,
            string_index: 0,
            attributes: 0x80,
            max_power: 250,
            interfaces: vec![
                Interface {
                    number: 0,
                    alternate_setting: 0,
                    class: 0x08,
                    subclass: 0x06,
                    protocol: 0x50,
                    string_index: 0,
                    class_descriptor: None,
                    endpoints: vec![Endpoint::bulk(0x81, 512), Endpoint::bulk(0x02, 512)],
                },
                Interface {
                    number: 0,
                    alternate_setting: 1,
                    class: 0x08,
                    subclass: 0x06,
                    protocol: 0x62,
                    string_index: 0,
                    class_descriptor: None,
                    endpoints: vec![
                        Endpoint::bulk(0x81, 512).with_class_descriptor(vec![4, 0x24, 0, 3]),
                        Endpoint::bulk(0x02, 512).with_class_descriptor(vec![4, 0x24, 0, 4]),
                    ],
                },
            ],
        };
        DeviceModel::new(device, vec![config], StringTable::default()).unwrap()
    }

    #[test]
    fn flattened_blob_layout() {
        let model = two_alt_model();
        let blob = model.raw_configuration(0).unwrap();
        // config(9) + alt0: iface(9) + 2*ep(7) + alt1: iface(9) + 2*(ep(7)+class(4))
        assert_eq!(blob.len(), 9 + 9 + 14 + 9 + 22);
        // wTotalLength covers the whole blob
        assert_eq!(u16::from_le_bytes([blob[2], blob[3]]) as usize, blob.len());
        // both alternate settings share one interface number
        assert_eq!(blob[4], 1);
        // alt 0 interface descriptor follows the configuration head
        assert_eq!(&blob[9..13], &[9, 4, 0, 0]);
        // alt 1 sits right after alt 0's endpoints
        assert_eq!(&blob[32..36], &[9, 4, 0, 1]);
        // first endpoint of alt 1 carries its class descriptor
        assert_eq!(&blob[48..52], &[4, 0x24, 0, 3]);
    }

    #[test]
    fn blob_is_stable_across_lookups() {
        let model = two_alt_model();
        let first = model.raw_configuration(0).unwrap().to_vec();
        assert_eq!(model.raw_configuration(0).unwrap(), first.as_slice());
    }

    #[test]
    fn unknown_configuration_index_is_reported() {
        let model = two_alt_model();
        assert!(matches!(
            model.raw_configuration(1),
            Err(DescriptorError::ConfigurationIndex { index: 1 })
        ));
    }

    #[test]
    fn interface_queries() {
        let model = two_alt_model();
        assert!(model.has_interface(0));
        assert!(!model.has_interface(1));
        assert_eq!(model.num_interfaces(0), 1);
        assert_eq!(model.first_interface().unwrap().protocol, 0x50);
    }

    #[test]
    fn qualifier_and_bos_are_optional() {
        let model = two_alt_model();
        assert!(matches!(
            model.device_qualifier_bytes(),
            Err(DescriptorError::UnsupportedType { .. })
        ));
        assert!(matches!(
            model.bos_bytes(),
            Err(DescriptorError::UnsupportedType { .. })
        ));

        let model = two_alt_model()
            .with_qualifier(DeviceQualifier {
                bcd_usb: 0x0200,
                device_class: 0,
                device_subclass: 0,
                device_protocol: 0,
                max_packet_size0: 64,
                num_configurations: 1,
            })
            .with_bos(Bos {
                capabilities: vec![vec![7, 0x10, 0x02, 0x06, 0, 0, 0]],
            });
        assert_eq!(model.device_qualifier_bytes().unwrap().len(), 10);
        assert_eq!(model.bos_bytes().unwrap().len(), 12);
    }
}
