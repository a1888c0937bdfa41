//! Registers that carry two's-complement values.
//!
//! Signedness is a property of the controller's register map (DeepSea GenComm
//! pages 4-7), not of the descriptor file, so it lives here as static data.

/// Sorted addresses whose contents are signed. 32-bit entries list their
/// first (high) word.
pub static SIGNED_ADDRESSES: &[u16] = &[
    // Page 4
    1025, // Coolant temperature
    1026, // Oil temperature
    1052, // Generator L1 watts
    1054, // Generator L2 watts
    1056, // Generator L3 watts
    1058, // Generator current lag/lead
    1072, // Mains voltage phase lag/lead
    1075, // Mains current phase lag/lead
    1084, // Mains L1 watts
    1086, // Mains L2 watts
    1088, // Mains L3 watts
    1090, // Bus current lag/lead
    1112, // Bus L1 watts
    1114, // Bus L2 watts
    1116, // Bus L3 watts
    1140, // Bus 2 L1 watts
    1142, // Bus 2 L2 watts
    1144, // Bus 2 L3 watts
    1147, // Bus 2 current lag/lead
    1169, // S1 L1 watts
    1171, // S1 L2 watts
    1173, // S1 L3 watts
    1175, // S1 current lag/lead
    1197, // S2 L1 watts
    1199, // S2 L2 watts
    1201, // S2 L3 watts
    1203, // S2 current lag/lead
    1210, // Load L1 watts
    1212, // Load L2 watts
    1214, // Load L3 watts
    1216, // Load current lag/lead
    1219, // Governor output
    1220, // AVR output
    1224, // DC Shunt 1 Current
    1226, // DC Shunt 2 Current
    1228, // DC Load Current
    1230, // DC Plant Battery Current
    1232, // DC Total Current
    1236, // DC Charger Watts
    1238, // DC Plant Battery Watts
    1240, // DC Load Watts
    1242, // DC Total Watts
    1245, // DC Plant Battery temperature
    1247, // Mains zero sequence voltage angle
    1248, // Mains positive sequence voltage angle
    1249, // Mains negative sequence voltage angle
    1256, // Battery Charger Output Current
    1258, // Battery Charger Output Voltage
    1260, // Battery Open Circuit Voltage
    1276, // Battery Charger Auxiliary Voltage
    1278, // Battery Charger Auxiliary Current
    // Page 5
    1286, // Inlet manifold temperature 1
    1287, // Inlet manifold temperature 2
    1288, // Exhaust temperature 1
    1289, // Exhaust temperature 2
    1295, // Fuel temperature
    1329, // Auxiliary sender 1 value
    1331, // Auxiliary sender 2 value
    1333, // Auxiliary sender 3 value
    1335, // Auxiliary sender 4 value
    1346, // After treatment temperature T1
    1347, // After treatment temperature T3
    1350, // Engine percentage torque
    1352, // Engine demand torque
    1356, // Nominal friction percentage torque
    1358, // Crank case pressure
    1366, // Exhaust gas port 1 temperature
    1367, // Exhaust gas port 2 temperature
    1368, // Exhaust gas port 3 temperature
    1369, // Exhaust gas port 4 temperature
    1370, // Exhaust gas port 5 temperature
    1371, // Exhaust gas port 6 temperature
    1372, // Exhaust gas port 7 temperature
    1373, // Exhaust gas port 8 temperature
    1374, // Exhaust gas port 9 temperature
    1375, // Exhaust gas port 10 temperature
    1376, // Exhaust gas port 11 temperature
    1377, // Exhaust gas port 12 temperature
    1378, // Exhaust gas port 13 temperature
    1379, // Exhaust gas port 14 temperature
    1380, // Exhaust gas port 15 temperature
    1381, // Exhaust gas port 16 temperature
    1382, // Intercooler temperature
    1383, // Turbo oil temperature
    1384, // ECU temperature
    1393, // Inlet manifold temperature 3
    1394, // Inlet manifold temperature 4
    1395, // Inlet manifold temperature 5
    1396, // Inlet manifold temperature 6
    1434, // Battery current
    1470, // LCD Temperature
    1472, // DEF Tank Temperature
    1481, // EGR Temperature
    1482, // Ambient Air Temperature
    1483, // Air Intake Temperature
    1490, // Oil Pressure
    1497, // Exhaust gas port 17 temperature
    1498, // Exhaust gas port 18 temperature
    1499, // Exhaust gas port 19 temperature
    1500, // Exhaust gas port 20 temperature
    // Page 6
    1536, // Generator total watts
    1544, // Generator total VA
    1546, // Generator L1 Var
    1548, // Generator L2 Var
    1550, // Generator L3 Var
    1552, // Generator total Var
    1554, // Generator power factor L1
    1555, // Generator power factor L2
    1556, // Generator power factor L3
    1557, // Generator average power factor
    1558, // Generator percentage of full power
    1559, // Generator percentage of full Var
    1560, // Mains total watts
    1570, // Mains L1 Var
    1572, // Mains L2 Var
    1574, // Mains L3 Var
    1576, // Mains total Var
    1578, // Mains power factor L1
    1579, // Mains power factor L2
    1580, // Mains power factor L3
    1581, // Mains average power factor
    1582, // Mains percentage of full power
    1583, // Mains percentage of full Var
    1584, // Bus total watts
    1594, // Bus L1 Var
    // Page 7
    1794, // Time to next engine maintenance
    1836, // Time to next engine maintenance alarm 1
    1840, // Time to next engine maintenance alarm 2
    1844, // Time to next engine maintenance alarm 3
    1848, // Time to next plant battery maintenance
    1856, // Time to next plant battery maintenance alarm 1
    1864, // Time to next plant battery maintenance alarm 2
    1872, // Time to next plant battery maintenance alarm 3
];

/// True when `address` holds a two's-complement value.
pub fn is_signed_address(address: u16) -> bool {
    SIGNED_ADDRESSES.binary_search(&address).is_ok()
}
