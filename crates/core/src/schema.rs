//! Observation schema.
//!
//! Every field an observation can carry is listed exactly once here, together
//! with the key used by the Infoclimat feed and the column used in the store.
//! The normaliser, the store DDL/queries and the feature builder all iterate
//! these lists instead of spelling field names themselves.

/// Feed key carrying the station identifier.
pub const STATION_ID_KEY: &str = "id_station";
/// Feed key carrying the hourly UTC timestamp.
pub const TIMESTAMP_KEY: &str = "dh_utc";

/// Store column of the station identifier.
pub const STATION_ID_COLUMN: &str = "station_id";
/// Store column of the canonical UTC timestamp.
pub const TIMESTAMP_COLUMN: &str = "timestamp_utc";

macro_rules! fields {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => ($source:literal, $column:literal),)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)+
        }

        impl $name {
            /// All fields in storage order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];
            pub const COUNT: usize = Self::ALL.len();

            /// Key used by the remote feed.
            pub const fn source_key(self) -> &'static str {
                match self {
                    $($name::$variant => $source,)+
                }
            }

            /// Column name in the observations table.
            pub const fn column(self) -> &'static str {
                match self {
                    $($name::$variant => $column,)+
                }
            }

            pub const fn index(self) -> usize {
                self as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.column())
            }
        }
    };
}

fields! {
    /// Numeric (floating point, nullable) observation fields.
    pub enum NumericField {
        Temperature => ("temperature", "temperature"),
        Pressure => ("pression", "pressure"),
        PressureChange3h => ("pression_variation_3h", "pressure_change_3h"),
        Humidity => ("humidite", "humidity"),
        DewPoint => ("point_de_rosee", "dew_point"),
        Visibility => ("visibilite", "visibility"),
        WindMean => ("vent_moyen", "wind_mean"),
        WindGust => ("vent_rafales", "wind_gust"),
        WindGust10Min => ("vent_rafales_10min", "wind_gust_10min"),
        WindDirection => ("vent_direction", "wind_direction"),
        TempMin => ("temperature_min", "temp_min"),
        TempMax => ("temperature_max", "temp_max"),
        Rain1h => ("pluie_1h", "rain_1h"),
        Rain3h => ("pluie_3h", "rain_3h"),
        Rain6h => ("pluie_6h", "rain_6h"),
        Rain12h => ("pluie_12h", "rain_12h"),
        Rain24h => ("pluie_24h", "rain_24h"),
        RainSinceMidnight => ("pluie_cumul_0h", "rain_cumulative_since_midnight"),
        RainIntensity => ("pluie_intensite", "rain_intensity"),
        RainIntensityMax1h => ("pluie_intensite_max_1h", "rain_intensity_max_1h"),
        Uv => ("uv", "uv"),
        UvIndex => ("uv_index", "uv_index"),
        SunshineDuration => ("ensoleillement", "sunshine_duration"),
        GroundTemperature => ("temperature_sol", "ground_temperature"),
    }
}

fields! {
    /// Free-text observation fields, passed through untouched.
    pub enum TextField {
        Complements => ("complements", "complements"),
        WeatherCode => ("temps_omm", "weather_code"),
        Source => ("source", "source"),
    }
}

/// `CREATE TABLE` statement for the observations table, derived from the field lists.
pub fn create_table_sql() -> String {
    let numeric = NumericField::ALL
        .iter()
        .map(|f| format!("    {} REAL", f.column()));
    let text = TextField::ALL
        .iter()
        .map(|f| format!("    {} TEXT", f.column()));
    let columns: Vec<String> = numeric.chain(text).collect();

    format!(
        "CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    {station} TEXT NOT NULL,
    {timestamp} TEXT NOT NULL,
{columns},
    inserted_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE({station}, {timestamp})
)",
        station = STATION_ID_COLUMN,
        timestamp = TIMESTAMP_COLUMN,
        columns = columns.join(",\n"),
    )
}

/// Column list shared by the upsert and the select queries, keys first.
pub fn data_columns() -> Vec<&'static str> {
    let mut columns = vec![STATION_ID_COLUMN, TIMESTAMP_COLUMN];
    columns.extend(NumericField::ALL.iter().map(|f| f.column()));
    columns.extend(TextField::ALL.iter().map(|f| f.column()));
    columns
}
