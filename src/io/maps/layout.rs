use std::fmt::Display;

/// Placeholder substituted with the requested fit type in path templates
pub const FIT_TYPE_TOKEN: &str = "{fit_type}";

/// The fields an [`ExtractionResult`](crate::xrf::ExtractionResult) can be populated with
/// from a container, used to declare what a layout requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredField {
    ChannelData,
    ChannelNames,
    ScalerValues,
    ScalerNames,
    XAxis,
    YAxis,
    EnergyAxis,
    IntegratedSpectrum,
}

impl Display for RequiredField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequiredField::ChannelData => "channel_data",
            RequiredField::ChannelNames => "channel_names",
            RequiredField::ScalerValues => "scaler_values",
            RequiredField::ScalerNames => "scaler_names",
            RequiredField::XAxis => "x_axis",
            RequiredField::YAxis => "y_axis",
            RequiredField::EnergyAxis => "energy_axis",
            RequiredField::IntegratedSpectrum => "integrated_spectrum",
        };
        f.write_str(name)
    }
}

/// Where one on-disk schema version of the MAPS analyzed-data container keeps
/// each dataset. Paths are relative to the file root and may contain
/// [`FIT_TYPE_TOKEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutDescriptor {
    pub name: &'static str,
    pub root_group: &'static str,
    /// The group whose children are the fit types
    pub analyzed_group: &'static str,
    pub channel_data: &'static str,
    pub channel_names: &'static str,
    pub scaler_values: &'static str,
    pub scaler_names: &'static str,
    pub x_axis: &'static str,
    pub y_axis: &'static str,
    pub energy_axis: Option<&'static str>,
    pub integrated_spectrum: Option<&'static str>,
}

/// Grouped scalers and scan axes, `MAPS/Scalers/*` and `MAPS/Scan/*`
pub const MAPS_V10: LayoutDescriptor = LayoutDescriptor {
    name: "v10",
    root_group: "MAPS",
    analyzed_group: "MAPS/XRF_Analyzed",
    channel_data: "MAPS/XRF_Analyzed/{fit_type}/Counts_Per_Sec",
    channel_names: "MAPS/XRF_Analyzed/{fit_type}/Channel_Names",
    scaler_values: "MAPS/Scalers/Values",
    scaler_names: "MAPS/Scalers/Names",
    x_axis: "MAPS/Scan/x_axis",
    y_axis: "MAPS/Scan/y_axis",
    energy_axis: None,
    integrated_spectrum: None,
};

/// Flat scalers and axes directly under `MAPS`, with the integrated spectrum
pub const MAPS_V9_SPECTRA: LayoutDescriptor = LayoutDescriptor {
    name: "v9-spectra",
    root_group: "MAPS",
    analyzed_group: "MAPS/XRF_Analyzed",
    channel_data: "MAPS/XRF_Analyzed/{fit_type}/Counts_Per_Sec",
    channel_names: "MAPS/XRF_Analyzed/{fit_type}/Channel_Names",
    scaler_values: "MAPS/scalers",
    scaler_names: "MAPS/scaler_names",
    x_axis: "MAPS/x_axis",
    y_axis: "MAPS/y_axis",
    energy_axis: Some("MAPS/energy"),
    integrated_spectrum: Some("MAPS/int_spec"),
};

/// Flat scalers and axes directly under `MAPS`
pub const MAPS_V9: LayoutDescriptor = LayoutDescriptor {
    name: "v9",
    energy_axis: None,
    integrated_spectrum: None,
    ..MAPS_V9_SPECTRA
};

/// The built-in candidates in the order the resolver tries them
pub const DEFAULT_LAYOUTS: &[LayoutDescriptor] = &[MAPS_V10, MAPS_V9_SPECTRA, MAPS_V9];

pub(crate) fn expand(template: &str, fit_type: &str) -> String {
    template.replace(FIT_TYPE_TOKEN, fit_type)
}

impl LayoutDescriptor {
    /// The fields this layout must populate, each paired with the template it is read from
    pub fn required_fields(&self) -> Vec<(RequiredField, &'static str)> {
        let mut fields = vec![
            (RequiredField::ChannelData, self.channel_data),
            (RequiredField::ChannelNames, self.channel_names),
            (RequiredField::ScalerValues, self.scaler_values),
            (RequiredField::ScalerNames, self.scaler_names),
            (RequiredField::XAxis, self.x_axis),
            (RequiredField::YAxis, self.y_axis),
        ];
        if let Some(path) = self.energy_axis {
            fields.push((RequiredField::EnergyAxis, path));
        }
        if let Some(path) = self.integrated_spectrum {
            fields.push((RequiredField::IntegratedSpectrum, path));
        }
        fields
    }

    /// The concrete dataset paths this layout reads for `fit_type`
    pub fn required_paths(&self, fit_type: &str) -> Vec<(RequiredField, String)> {
        self.required_fields()
            .into_iter()
            .map(|(field, template)| (field, expand(template, fit_type)))
            .collect()
    }
}

impl Display for LayoutDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_required_paths() {
        let paths = MAPS_V9_SPECTRA.required_paths("NNLS");
        assert_eq!(paths.len(), 8);
        assert_eq!(
            paths[0],
            (
                RequiredField::ChannelData,
                "MAPS/XRF_Analyzed/NNLS/Counts_Per_Sec".to_string()
            )
        );
        assert!(paths.contains(&(RequiredField::IntegratedSpectrum, "MAPS/int_spec".to_string())));

        let paths = MAPS_V10.required_paths("ROI");
        assert_eq!(paths.len(), 6);
        assert!(paths.contains(&(RequiredField::ScalerValues, "MAPS/Scalers/Values".to_string())));
    }

    #[test]
    fn test_layouts_differ_only_in_paths() {
        assert_eq!(MAPS_V9.scaler_values, MAPS_V9_SPECTRA.scaler_values);
        assert!(MAPS_V9.energy_axis.is_none());
        assert_eq!(DEFAULT_LAYOUTS.len(), 3);
        assert_eq!(DEFAULT_LAYOUTS[0].name, "v10");
    }
}
