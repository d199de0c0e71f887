//! Native GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Supports what the engine needs: single-band rasters, the
//! ModelPixelScale + ModelTiepoint pair for georeferencing, an EPSG code in
//! the GeoKeyDirectory and the `GDAL_NODATA` sentinel.

use crate::crs::{CrsKind, CRS};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

// GeoKey ids
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Override the raster's own sentinel in the `GDAL_NODATA` tag
    pub nodata: Option<f64>,
}

/// Read band 1 of a GeoTIFF file into a Raster.
///
/// Cells equal to the file's `GDAL_NODATA` value, and non-finite floats,
/// are marked invalid.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let raster = decode_geotiff(BufReader::new(file))?;
    debug!(
        path = %path.display(),
        rows = raster.rows(),
        cols = raster.cols(),
        valid = raster.valid_count(),
        "read GeoTIFF"
    );
    Ok(raster)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn tiff_err(context: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Other(format!("{context}: {e}"))
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(tiff_err("TIFF decode error"))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let rows = height as usize;
    let cols = width as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let nodata = read_nodata(&mut decoder);
    let transform = read_geotransform(&mut decoder).ok();
    let crs = read_crs(&mut decoder);

    let result = decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?;

    // An f32 band stores the sentinel rounded to f32, so compare in that precision
    let nodata_key = match (&result, nodata) {
        (DecodingResult::F32(_), Some(nd)) => Some(f64::from(nd as f32)),
        (_, nd) => nd,
    };

    let values: Vec<f64> = match result {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    let cells = rows * cols;
    if values.is_empty() || values.len() % cells != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    // Pixel-interleaved samples: keep the first one
    let samples = values.len() / cells;

    let mut data = Array2::<T>::zeros((rows, cols));
    let mut valid = Array2::from_elem((rows, cols), false);
    for (i, raw) in values.into_iter().step_by(samples).enumerate() {
        let idx = (i / cols, i % cols);
        let is_nodata = nodata_key.is_some_and(|nd| raw == nd);
        if is_nodata || !raw.is_finite() {
            continue;
        }
        if let Some(v) = num_traits::cast::<f64, T>(raw) {
            data[idx] = v;
            valid[idx] = true;
        }
    }

    let mut raster = Raster::from_parts(data, valid)?;
    if let Some(transform) = transform {
        raster.set_transform(transform);
    }
    raster.set_crs(crs);
    if let Some(nd) = nodata.and_then(num_traits::cast::<f64, T>) {
        raster.set_nodata(nd);
    }
    Ok(raster)
}

/// `GDAL_NODATA` is an ASCII tag holding the sentinel as text
fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse::<f64>()
        .ok()
}

/// Attempt to read GeoTransform from TIFF tags
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]
        // scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// EPSG code from the GeoKeyDirectory, projected key first
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let lookup = |wanted: u16| {
        keys[4..]
            .chunks_exact(4)
            .find(|entry| entry[0] == wanted && entry[1] == 0)
            .map(|entry| entry[3])
            .filter(|&code| code != 0 && code != USER_DEFINED)
    };
    lookup(PROJECTED_CS_TYPE)
        .or_else(|| lookup(GEOGRAPHIC_TYPE))
        .map(|code| CRS::from_epsg(u32::from(code)))
}

/// GeoKeyDirectory entries for a CRS; only EPSG codes that fit a SHORT
/// are recorded
fn geokeys_for(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs
        .map(CRS::epsg)
        .and_then(|code| u16::try_from(code).ok());
    let geographic = crs.is_some_and(|c| c.kind() == CrsKind::Geographic);

    let mut entries: Vec<[u16; 4]> = Vec::new();
    let model = if geographic {
        MODEL_TYPE_GEOGRAPHIC
    } else {
        MODEL_TYPE_PROJECTED
    };
    entries.push([GT_MODEL_TYPE, 0, 1, model]);
    entries.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
    if let Some(code) = epsg {
        let key = if geographic {
            GEOGRAPHIC_TYPE
        } else {
            PROJECTED_CS_TYPE
        };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

/// Write a Raster to a single-band 32-bit float GeoTIFF file.
///
/// Invalid cells are written as the sentinel.
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path)?;
    encode_geotiff(raster, BufWriter::new(file), options.unwrap_or_default())?;
    debug!(path = %path.display(), "wrote GeoTIFF");
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;

    let (rows, cols) = raster.shape();
    let nodata = options
        .nodata
        .or_else(|| num_traits::cast::<T, f64>(raster.nodata()))
        .unwrap_or(-9999.0);
    let nodata32 = nodata as f32;

    let data: Vec<f32> = raster
        .data()
        .iter()
        .zip(raster.validity().iter())
        .map(|(&v, &ok)| {
            if ok {
                num_traits::cast(v).unwrap_or(nodata32)
            } else {
                nodata32
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(tiff_err("Cannot create TIFF image"))?;

    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(tiff_err("Cannot write scale tag"))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(tiff_err("Cannot write tiepoint tag"))?;

    let geokeys = geokeys_for(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(tiff_err("Cannot write geokey tag"))?;

    let nodata_text = format!("{nodata}");
    image
        .encoder()
        .write_tag(Tag::GdalNodata, nodata_text.as_str())
        .map_err(tiff_err("Cannot write nodata tag"))?;

    image
        .write_data(&data)
        .map_err(tiff_err("Cannot write image data"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Raster<f64> {
        let mut r = Raster::from_vec(vec![1.0, 2.5, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        r.set_invalid(1, 1).unwrap();
        r.set_transform(GeoTransform::new(400_000.0, 2_050_000.0, 30.0, -30.0));
        r.set_crs(Some(CRS::from_epsg(32643)));
        r
    }

    #[test]
    fn buffer_roundtrip_keeps_validity_and_georeferencing() {
        let raster = sample();
        let bytes = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.value(1, 1), None);
        assert_relative_eq!(back.value(0, 1).unwrap(), 2.5);
        assert_eq!(back.valid_count(), 5);
        assert!(back.transform().approx_eq(raster.transform(), 1e-9));
        assert_eq!(back.crs().map(CRS::epsg), Some(32643));
        assert_relative_eq!(back.nodata(), -9999.0);
    }

    #[test]
    fn geographic_crs_uses_geographic_key() {
        let keys = geokeys_for(Some(&CRS::wgs84()));
        assert!(keys.chunks_exact(4).any(|e| e == [GEOGRAPHIC_TYPE, 0, 1, 4326]));
        assert!(keys.chunks_exact(4).any(|e| e == [GT_MODEL_TYPE, 0, 1, MODEL_TYPE_GEOGRAPHIC]));
    }

    #[test]
    fn custom_sentinel_is_honoured() {
        let raster = sample();
        let opts = GeoTiffOptions { nodata: Some(-1.0) };
        let bytes = write_geotiff_to_buffer(&raster, Some(opts)).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(back.value(1, 1), None);
        assert_relative_eq!(back.nodata(), -1.0);
    }

    #[test]
    fn non_dyadic_sentinel_survives_f32_storage() {
        let raster = sample();
        let opts = GeoTiffOptions { nodata: Some(0.1) };
        let bytes = write_geotiff_to_buffer(&raster, Some(opts)).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(back.value(1, 1), None);
        assert_eq!(back.valid_count(), 5);
        assert_relative_eq!(back.nodata(), 0.1);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_geotiff::<f64, _>("/definitely/not/here.tif").unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        write_geotiff(&sample(), &path, None).unwrap();
        let back: Raster<f64> = read_geotiff(&path).unwrap();
        assert_eq!(back.valid_count(), 5);
    }
}
